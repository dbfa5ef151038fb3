//! Thumbnail extraction.

use std::path::Path;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::get_duration;

/// Output width in pixels; height follows the source aspect ratio.
const THUMBNAIL_WIDTH: u32 = 480;

const THUMBNAIL_TIMEOUT_SECS: u64 = 30;

/// Extract a single JPEG frame at 25% of the clip's duration.
///
/// Callers treat thumbnail failure as non-fatal; this function still
/// reports errors so they can be logged.
pub async fn generate_thumbnail(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let duration = get_duration(input).await?;
    let seek_to = duration * 0.25;

    let cmd = FfmpegCommand::new(input, output.as_ref())
        .seek(seek_to)
        .single_frame()
        .video_filter(format!("scale={THUMBNAIL_WIDTH}:-2"));

    FfmpegRunner::new()
        .with_timeout(THUMBNAIL_TIMEOUT_SECS)
        .run(&cmd)
        .await?;

    debug!(
        input = %input.display(),
        seek_to,
        "generated thumbnail"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_input_is_an_error() {
        let err = generate_thumbnail("/nonexistent/clip.mp4", "/tmp/thumb.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
