//! Media inspection via ffprobe.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// The parts of a probed video the pipeline consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Container duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct ProbeReply {
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
}

/// Probe a video file for duration and dimensions.
///
/// Fails with [`MediaError::InvalidVideo`] when the file carries no video
/// stream, which is how audio-only inputs are told apart downstream.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let stdout = run_ffprobe(
        &[
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_entries",
            "format=duration:stream=codec_type,width,height",
        ],
        path,
    )
    .await?;

    let reply: ProbeReply = serde_json::from_slice(&stdout)?;

    let video = reply
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("no video stream".to_string()))?;

    Ok(VideoInfo {
        duration: parse_duration(reply.format.duration.as_deref()),
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
    })
}

/// Duration of a video file in seconds, rejecting zero-length files.
pub async fn get_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let info = probe_video(path).await?;
    if info.duration <= 0.0 {
        return Err(MediaError::InvalidVideo(
            "file reports zero duration".to_string(),
        ));
    }
    Ok(info.duration)
}

/// Duration from the format block alone. Works for audio-only files,
/// which [`probe_video`] rejects.
pub(crate) async fn format_duration(path: &Path) -> MediaResult<f64> {
    let stdout = run_ffprobe(
        &["-v", "quiet", "-show_entries", "format=duration", "-of", "csv=p=0"],
        path,
    )
    .await?;

    String::from_utf8_lossy(&stdout)
        .trim()
        .parse::<f64>()
        .map_err(|_| MediaError::InvalidVideo("unreadable duration".to_string()))
}

async fn run_ffprobe(args: &[&str], path: &Path) -> MediaResult<Vec<u8>> {
    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "ffprobe exited with non-zero status".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }
    Ok(output.stdout)
}

fn parse_duration(raw: Option<&str>) -> f64 {
    raw.and_then(|d| d.parse::<f64>().ok()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_parsing_picks_the_video_stream() {
        let raw = br#"{
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 1920, "height": 1080}
            ],
            "format": {"duration": "123.456"}
        }"#;
        let reply: ProbeReply = serde_json::from_slice(raw).unwrap();
        let video = reply
            .streams
            .iter()
            .find(|s| s.codec_type == "video")
            .unwrap();
        assert_eq!(video.width, Some(1920));
        assert_eq!(video.height, Some(1080));
        assert!((parse_duration(reply.format.duration.as_deref()) - 123.456).abs() < 1e-9);
    }

    #[test]
    fn missing_duration_reads_as_zero() {
        assert_eq!(parse_duration(None), 0.0);
        assert_eq!(parse_duration(Some("N/A")), 0.0);
    }
}
