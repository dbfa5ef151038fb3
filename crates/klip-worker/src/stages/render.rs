//! Render stage: cut, filter and encode one clip, then upload it with
//! its thumbnail and settle the owning video.

use std::path::PathBuf;

use tracing::{info, warn};

use klip_db::ClipRepo;
use klip_media::{
    compose_ass, concat_stream_copy, generate_thumbnail, render_clip, render_end_card,
    FilterChainSpec, RenderSpec,
};
use klip_models::{ClipStatus, CtaPosition};
use klip_queue::{QueueJob, RenderJob};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{retry_async, RetryConfig};

pub async fn run(ctx: &WorkerContext, job: &RenderJob) -> WorkerResult<()> {
    job.validate()?;

    let clip = ClipRepo::get(&ctx.pool, &job.clip_id).await?;
    match clip.status() {
        ClipStatus::Pending => {
            ClipRepo::transition(
                &ctx.pool,
                &job.clip_id,
                ClipStatus::Pending,
                ClipStatus::Rendering,
            )
            .await?;
        }
        // A redelivery after a crash mid-render; run it again.
        ClipStatus::Rendering => {}
        ClipStatus::Ready | ClipStatus::Failed => {
            info!(clip_id = %job.clip_id, status = clip.status().as_str(), "clip already settled, skipping");
            return Ok(());
        }
    }

    ctx.render_limiter.until_ready().await;

    let workdir = tempfile::tempdir_in(&ctx.config.work_dir)?;

    let source_path = workdir.path().join("source");
    ctx.storage
        .download_file(&job.source_file_path, &source_path)
        .await?;

    let clip_duration = job.end_time - job.start_time;

    let subtitle_path = if job.subtitle_segments.is_empty() {
        None
    } else {
        let doc = compose_ass(&job.subtitle_segments, job.format, clip_duration);
        let path = workdir.path().join("subtitles.ass");
        tokio::fs::write(&path, doc).await?;
        Some(path)
    };

    let spec = RenderSpec {
        start_time: job.start_time,
        end_time: job.end_time,
        format: job.format,
        filters: FilterChainSpec {
            subtitle_path,
            cta: job.cta.clone(),
            clip_duration,
            watermark: job.watermark,
        },
    };

    let body_path = workdir.path().join("clip.mp4");
    render_clip(&source_path, &body_path, &spec).await?;

    // End-card CTAs become a separate segment concatenated after the clip;
    // overlay CTAs were already drawn by the filter chain.
    let output_path = match &job.cta {
        Some(cta) if cta.position == CtaPosition::End => {
            let card_path = workdir.path().join("endcard.mp4");
            render_end_card(&card_path, &cta.text, job.format, cta.duration).await?;

            let final_path = workdir.path().join("final.mp4");
            let inputs: Vec<PathBuf> = vec![body_path, card_path];
            concat_stream_copy(&inputs, &final_path).await?;
            final_path
        }
        _ => body_path,
    };

    let thumb_path = workdir.path().join("thumbnail.jpg");
    let thumbnail = match generate_thumbnail(&output_path, &thumb_path).await {
        Ok(()) => Some(thumb_path),
        Err(e) => {
            warn!(clip_id = %job.clip_id, error = %e, "thumbnail generation failed");
            None
        }
    };

    let clip_key = klip_storage::clip_key(&job.user_id, &job.video_id, &job.clip_id)?;
    retry_async(&RetryConfig::new("clip_upload"), || {
        ctx.storage.upload_file(&output_path, &clip_key, "video/mp4")
    })
    .await?;

    let thumbnail_key = match thumbnail {
        Some(path) => {
            let key = klip_storage::thumbnail_key(&job.user_id, &job.video_id, &job.clip_id)?;
            match retry_async(&RetryConfig::new("thumbnail_upload"), || {
                ctx.storage.upload_file(&path, &key, "image/jpeg")
            })
            .await
            {
                Ok(()) => Some(key),
                Err(e) => {
                    warn!(clip_id = %job.clip_id, error = %e, "thumbnail upload failed");
                    None
                }
            }
        }
        None => None,
    };

    ClipRepo::mark_ready(&ctx.pool, &job.clip_id, &clip_key, thumbnail_key.as_deref()).await?;

    let video_status = ClipRepo::settle_video(&ctx.pool, &job.video_id).await?;
    info!(
        clip_id = %job.clip_id,
        video_id = %job.video_id,
        video_status = video_status.as_str(),
        "clip rendered"
    );

    Ok(())
}

/// Terminal failure path: fail the clip, then settle the video in case
/// this was its last outstanding clip.
pub async fn fail_clip(ctx: &WorkerContext, job: &RenderJob, error: &str) -> WorkerResult<()> {
    ClipRepo::mark_failed(&ctx.pool, &job.clip_id, error).await?;
    ClipRepo::settle_video(&ctx.pool, &job.video_id).await?;
    Ok(())
}
