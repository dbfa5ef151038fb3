//! Stage handlers and the trait tying each job type to its handler.

pub mod analyze;
pub mod download;
pub mod render;
pub mod transcribe;

use std::future::Future;
use std::sync::Arc;

use tracing::error;

use klip_db::VideoRepo;
use klip_queue::{AnalyzeJob, DownloadJob, QueueJob, RenderJob, TranscribeJob};

use crate::context::WorkerContext;
use crate::error::WorkerResult;

/// One pipeline stage: how to process a job, and how to fail the owning
/// entity when the job is abandoned (terminal error or retry exhaustion).
pub trait StageJob: QueueJob + Clone + Send + 'static {
    fn process(
        ctx: Arc<WorkerContext>,
        job: Self,
    ) -> impl Future<Output = WorkerResult<()>> + Send;

    fn fail_entity(
        ctx: Arc<WorkerContext>,
        job: Self,
        error: String,
    ) -> impl Future<Output = ()> + Send;
}

async fn fail_video(ctx: &WorkerContext, video_id: &str, error: &str) {
    if let Err(e) = VideoRepo::mark_failed(&ctx.pool, video_id, error).await {
        error!(video_id, error = %e, "failed to mark video failed");
    }
}

impl StageJob for DownloadJob {
    async fn process(ctx: Arc<WorkerContext>, job: Self) -> WorkerResult<()> {
        download::run(&ctx, &job).await
    }

    async fn fail_entity(ctx: Arc<WorkerContext>, job: Self, error: String) {
        fail_video(&ctx, &job.video_id, &error).await;
    }
}

impl StageJob for TranscribeJob {
    async fn process(ctx: Arc<WorkerContext>, job: Self) -> WorkerResult<()> {
        transcribe::run(&ctx, &job).await
    }

    async fn fail_entity(ctx: Arc<WorkerContext>, job: Self, error: String) {
        fail_video(&ctx, &job.video_id, &error).await;
    }
}

impl StageJob for AnalyzeJob {
    async fn process(ctx: Arc<WorkerContext>, job: Self) -> WorkerResult<()> {
        analyze::run(&ctx, &job).await
    }

    async fn fail_entity(ctx: Arc<WorkerContext>, job: Self, error: String) {
        fail_video(&ctx, &job.video_id, &error).await;
    }
}

impl StageJob for RenderJob {
    async fn process(ctx: Arc<WorkerContext>, job: Self) -> WorkerResult<()> {
        render::run(&ctx, &job).await
    }

    async fn fail_entity(ctx: Arc<WorkerContext>, job: Self, error: String) {
        if let Err(e) = render::fail_clip(&ctx, &job, &error).await {
            error!(clip_id = %job.clip_id, error = %e, "failed to mark clip failed");
        }
    }
}
