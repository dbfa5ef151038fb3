//! Download stage: fetch the source video, store it, hand off to
//! transcription.

use tracing::{info, warn};

use klip_db::VideoRepo;
use klip_media::probe_video;
use klip_models::VideoStatus;
use klip_queue::{DownloadJob, QueueError, TranscribeJob};
use klip_storage::source_key;

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{retry_async, RetryConfig};

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

pub async fn run(ctx: &WorkerContext, job: &DownloadJob) -> WorkerResult<()> {
    let video = VideoRepo::get(&ctx.pool, &job.video_id).await?;
    match video.status() {
        VideoStatus::Downloading => {}
        VideoStatus::Transcribing
        | VideoStatus::Analyzing
        | VideoStatus::GeneratingClips
        | VideoStatus::Completed => {
            info!(video_id = %job.video_id, "source already fetched, skipping");
            return Ok(());
        }
        other => {
            return Err(WorkerError::terminal(format!(
                "video {} not downloadable in status {}",
                job.video_id,
                other.as_str()
            )))
        }
    }

    let workdir = tempfile::tempdir_in(&ctx.config.work_dir)?;

    let downloaded = ctx.fetcher.download_video(&job.url, workdir.path()).await?;
    info!(
        video_id = %job.video_id,
        size = downloaded.size,
        container = downloaded.container,
        "source downloaded"
    );

    let probed = probe_video(&downloaded.path).await?;
    if probed.duration <= 0.0 {
        return Err(WorkerError::terminal(format!(
            "video {} reports zero duration",
            job.video_id
        )));
    }
    info!(
        video_id = %job.video_id,
        duration = probed.duration,
        width = probed.width,
        height = probed.height,
        "source probed"
    );
    let duration = probed.duration;

    let key = source_key(&job.user_id, &job.video_id, &downloaded.extension)?;
    let content_type = content_type_for(&downloaded.extension);
    retry_async(&RetryConfig::new("source_upload"), || {
        ctx.storage.upload_file(&downloaded.path, &key, content_type)
    })
    .await?;

    VideoRepo::set_source(&ctx.pool, &job.video_id, &key, duration).await?;
    VideoRepo::transition(
        &ctx.pool,
        &job.video_id,
        VideoStatus::Downloading,
        VideoStatus::Transcribing,
    )
    .await?;

    let next = TranscribeJob::new(
        &job.video_id,
        &job.user_id,
        &key,
        job.strategy,
        job.plan,
        "ru",
    );
    match ctx.queue.enqueue(&next).await {
        Ok(_) => {}
        Err(QueueError::EnqueueFailed(msg)) => {
            warn!(video_id = %job.video_id, msg, "transcribe already queued");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
