//! Clip rendering, end-card rendering and stream-copy concatenation.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

use klip_models::ClipFormat;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{build_filter_chain, FilterChainSpec};

/// Hard wall-clock limit for a single render invocation.
pub const RENDER_TIMEOUT_SECS: u64 = 5 * 60;

/// Inputs for one clip render.
#[derive(Debug, Clone)]
pub struct RenderSpec {
    /// Trim start in source time, seconds
    pub start_time: f64,
    /// Trim end in source time, seconds
    pub end_time: f64,
    /// Target output format
    pub format: ClipFormat,
    /// Filter chain inputs (subtitles, CTA overlay, watermark)
    pub filters: FilterChainSpec,
}

impl RenderSpec {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Render a time-trimmed, filtered clip to `output`.
pub async fn render_clip(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    spec: &RenderSpec,
) -> MediaResult<()> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    if spec.duration() <= 0.0 {
        return Err(MediaError::InvalidVideo(format!(
            "Non-positive clip duration: {:.3}s to {:.3}s",
            spec.start_time, spec.end_time
        )));
    }

    let vf = build_filter_chain(spec.format, &spec.filters);

    let cmd = FfmpegCommand::new(input, output.as_ref())
        .seek(spec.start_time)
        .until(spec.end_time)
        .video_filter(vf)
        .video_codec("libx264")
        .preset("fast")
        .crf(23)
        .audio_codec("aac")
        .audio_bitrate("128k")
        .output_args(["-movflags", "+faststart"]);

    FfmpegRunner::new()
        .with_timeout(RENDER_TIMEOUT_SECS)
        .run(&cmd)
        .await?;

    info!(
        output = %output.as_ref().display(),
        duration = spec.duration(),
        format = %spec.format,
        "rendered clip"
    );
    Ok(())
}

/// Render a full-screen CTA end card: black background, centered text,
/// silent audio, matching the clip's codec settings so the two files can
/// be concatenated by stream copy.
pub async fn render_end_card(
    output: impl AsRef<Path>,
    text: &str,
    format: ClipFormat,
    duration_secs: u32,
) -> MediaResult<()> {
    let (w, h) = format.dimensions();
    let escaped = text
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
        .replace('%', "\\%");

    let args: Vec<String> = vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!("color=c=black:s={w}x{h}:d={duration_secs}"),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!("anullsrc=channel_layout=stereo:sample_rate=44100:d={duration_secs}"),
        "-vf".to_string(),
        format!(
            "drawtext=text='{escaped}':fontsize=72:fontcolor=white:\
             x=(w-text_w)/2:y=(h-text_h)/2"
        ),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-crf".to_string(),
        "23".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
        "-shortest".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.as_ref().to_string_lossy().to_string(),
    ];

    FfmpegRunner::new()
        .with_timeout(RENDER_TIMEOUT_SECS)
        .run_args(&args)
        .await
}

/// Losslessly concatenate already-encoded files via the concat demuxer.
///
/// All inputs must share codec parameters (which our render paths guarantee).
pub async fn concat_stream_copy(
    inputs: &[PathBuf],
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    if inputs.len() < 2 {
        return Err(MediaError::InvalidVideo(
            "Concatenation needs at least two inputs".to_string(),
        ));
    }

    // The concat demuxer reads its file list from disk.
    let list_path = output.as_ref().with_extension("concat.txt");
    let mut list = String::new();
    for input in inputs {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.clone()));
        }
        list.push_str(&format!("file '{}'\n", input.to_string_lossy().replace('\'', "'\\''")));
    }

    let mut file = tokio::fs::File::create(&list_path).await?;
    file.write_all(list.as_bytes()).await?;
    file.flush().await?;

    let args: Vec<String> = vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_path.to_string_lossy().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        output.as_ref().to_string_lossy().to_string(),
    ];

    let result = FfmpegRunner::new()
        .with_timeout(RENDER_TIMEOUT_SECS)
        .run_args(&args)
        .await;

    let _ = tokio::fs::remove_file(&list_path).await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterChainSpec;

    #[tokio::test]
    async fn rejects_missing_input() {
        let spec = RenderSpec {
            start_time: 0.0,
            end_time: 30.0,
            format: ClipFormat::Portrait,
            filters: FilterChainSpec::default(),
        };
        let err = render_clip("/nonexistent/in.mp4", "/tmp/out.mp4", &spec)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn rejects_inverted_trim_window() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"not a real video").unwrap();

        let spec = RenderSpec {
            start_time: 30.0,
            end_time: 30.0,
            format: ClipFormat::Portrait,
            filters: FilterChainSpec::default(),
        };
        let err = render_clip(&input, dir.path().join("out.mp4"), &spec)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }

    #[tokio::test]
    async fn concat_requires_two_inputs() {
        let err = concat_stream_copy(&[PathBuf::from("/tmp/a.mp4")], "/tmp/out.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }
}
