//! Audio extraction and chunking for speech-to-text upload.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{format_duration, get_duration};

/// Chunk length for STT upload. Providers cap request size, and shorter
/// chunks keep per-request timeouts meaningful.
pub const CHUNK_DURATION_SECS: f64 = 180.0;

/// Timeout for a single extraction or chunk encode.
const AUDIO_TIMEOUT_SECS: u64 = 120;

/// One encoded audio chunk, positioned in source time.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Path to the encoded MP3
    pub path: PathBuf,
    /// Offset of this chunk from the start of the source, in seconds
    pub start_offset: f64,
    /// Chunk duration in seconds
    pub duration: f64,
}

/// Extract the audio track as mono 16 kHz WAV, the format STT models expect.
pub async fn extract_audio(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let cmd = FfmpegCommand::new(input, output.as_ref())
        .no_video()
        .output_args(["-ac", "1", "-ar", "16000"]);

    FfmpegRunner::new()
        .with_timeout(AUDIO_TIMEOUT_SECS)
        .run(&cmd)
        .await?;

    debug!(input = %input.display(), "extracted mono 16kHz audio");
    Ok(())
}

/// Split an audio file into fixed-length MP3 chunks for upload.
///
/// Each chunk is encoded with libmp3lame at quality 2. The final chunk may
/// be shorter than [`CHUNK_DURATION_SECS`].
pub async fn split_audio(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
) -> MediaResult<Vec<AudioChunk>> {
    let input = input.as_ref();
    let output_dir = output_dir.as_ref();

    let total_duration = get_duration_audio(input).await?;

    let mut chunks = Vec::new();
    let mut offset = 0.0;
    let mut index = 0usize;

    while offset < total_duration {
        let duration = (total_duration - offset).min(CHUNK_DURATION_SECS);
        let chunk_path = output_dir.join(format!("chunk_{index:04}.mp3"));

        let cmd = FfmpegCommand::new(input, &chunk_path)
            .seek(offset)
            .duration(duration)
            .audio_codec("libmp3lame")
            .output_args(["-q:a", "2"]);

        FfmpegRunner::new()
            .with_timeout(AUDIO_TIMEOUT_SECS)
            .run(&cmd)
            .await?;

        chunks.push(AudioChunk {
            path: chunk_path,
            start_offset: offset,
            duration,
        });

        offset += CHUNK_DURATION_SECS;
        index += 1;
    }

    info!(
        chunks = chunks.len(),
        total_duration, "split audio for transcription"
    );
    Ok(chunks)
}

/// Duration of an audio-only file. ffprobe reports it in the format block,
/// so fall back to a format-only read when the video probe rejects the file.
async fn get_duration_audio(path: &Path) -> MediaResult<f64> {
    match get_duration(path).await {
        Ok(d) => Ok(d),
        Err(MediaError::InvalidVideo(_)) => format_duration(path).await,
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_plan_covers_total_duration() {
        // 400s of audio at 180s chunks: offsets 0, 180, 360 with the last
        // chunk 40s long.
        let total: f64 = 400.0;
        let mut offsets = Vec::new();
        let mut offset = 0.0;
        while offset < total {
            offsets.push((offset, (total - offset).min(CHUNK_DURATION_SECS)));
            offset += CHUNK_DURATION_SECS;
        }
        assert_eq!(offsets.len(), 3);
        assert_eq!(offsets[0], (0.0, 180.0));
        assert_eq!(offsets[1], (180.0, 180.0));
        assert_eq!(offsets[2], (360.0, 40.0));
    }
}
