//! Per-stage consumption loops with bounded concurrency, stale-message
//! claiming and retry/DLQ handling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use klip_queue::{AnalyzeJob, Delivery, DownloadJob, QueueJob, RenderJob, TranscribeJob};

use crate::context::WorkerContext;
use crate::error::WorkerResult;
use crate::stages::StageJob;

/// How many messages one consume or claim round may pull.
const BATCH_LIMIT: usize = 5;

/// Block time for XREADGROUP, milliseconds.
const CONSUME_BLOCK_MS: u64 = 1000;

/// Runs one consumption loop per stage against a shared context.
pub struct StageExecutor {
    ctx: Arc<WorkerContext>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl StageExecutor {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());
        Self {
            ctx,
            shutdown,
            consumer_name,
        }
    }

    /// Start all stage loops and run until shutdown.
    pub async fn run(&self) -> WorkerResult<()> {
        self.ctx.queue.init().await?;
        info!(consumer = %self.consumer_name, "starting stage loops");

        let config = &self.ctx.config;
        let handles = vec![
            self.spawn_stage::<DownloadJob>(config.download_concurrency),
            self.spawn_stage::<TranscribeJob>(config.transcribe_concurrency),
            self.spawn_stage::<AnalyzeJob>(config.analyze_concurrency),
            self.spawn_stage::<RenderJob>(config.render_concurrency),
        ];

        for handle in handles {
            handle.await.ok();
        }
        info!("all stage loops stopped");
        Ok(())
    }

    /// Signal shutdown to every stage loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    fn spawn_stage<J: StageJob>(&self, concurrency: usize) -> JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        let consumer_name = self.consumer_name.clone();
        let shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(stage_loop::<J>(ctx, consumer_name, concurrency, shutdown_rx))
    }
}

async fn stage_loop<J: StageJob>(
    ctx: Arc<WorkerContext>,
    consumer_name: String,
    concurrency: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut claim_interval = tokio::time::interval(ctx.config.claim_interval);

    info!(stage = %J::STAGE, concurrency, "stage loop started");

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!(stage = %J::STAGE, "shutdown signal received");
                    break;
                }
            }
            _ = claim_interval.tick() => {
                let min_idle_ms = ctx.config.claim_min_idle.as_millis() as u64;
                match ctx.queue.claim_stale::<J>(&consumer_name, min_idle_ms, BATCH_LIMIT).await {
                    Ok(deliveries) if !deliveries.is_empty() => {
                        info!(stage = %J::STAGE, count = deliveries.len(), "claimed stale jobs");
                        dispatch::<J>(&ctx, &semaphore, deliveries).await;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(stage = %J::STAGE, error = %e, "failed to claim stale jobs"),
                }
            }
            result = consume_once::<J>(&ctx, &consumer_name, &semaphore) => {
                if let Err(e) = result {
                    error!(stage = %J::STAGE, error = %e, "error consuming jobs");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    // Let in-flight jobs drain before dropping the loop.
    let drained = tokio::time::timeout(ctx.config.shutdown_timeout, async {
        let _ = semaphore.acquire_many(concurrency as u32).await;
    })
    .await;
    if drained.is_err() {
        warn!(stage = %J::STAGE, "shutdown timeout with jobs still in flight");
    }
    info!(stage = %J::STAGE, "stage loop stopped");
}

async fn consume_once<J: StageJob>(
    ctx: &Arc<WorkerContext>,
    consumer_name: &str,
    semaphore: &Arc<Semaphore>,
) -> WorkerResult<()> {
    let available = semaphore.available_permits();
    if available == 0 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        return Ok(());
    }

    let deliveries = ctx
        .queue
        .consume::<J>(consumer_name, CONSUME_BLOCK_MS, available.min(BATCH_LIMIT))
        .await?;
    dispatch::<J>(ctx, semaphore, deliveries).await;
    Ok(())
}

async fn dispatch<J: StageJob>(
    ctx: &Arc<WorkerContext>,
    semaphore: &Arc<Semaphore>,
    deliveries: Vec<Delivery<J>>,
) {
    for delivery in deliveries {
        let Ok(permit) = Arc::clone(semaphore).acquire_owned().await else {
            break;
        };
        let ctx = Arc::clone(ctx);
        tokio::spawn(async move {
            let _permit = permit;
            execute::<J>(ctx, delivery).await;
        });
    }
}

/// Run one job and settle its message: ack on success, fail-and-DLQ on
/// terminal errors, leave pending (bounded by the retry budget) on
/// transient ones.
async fn execute<J: StageJob>(ctx: Arc<WorkerContext>, delivery: Delivery<J>) {
    let job_id = delivery.job.job_id().to_string();
    debug!(stage = %J::STAGE, job_id, "executing job");

    match J::process(Arc::clone(&ctx), delivery.job.clone()).await {
        Ok(()) => {
            info!(stage = %J::STAGE, job_id, "job completed");
            if let Err(e) = ctx.queue.ack(J::STAGE, &delivery.message_id).await {
                error!(stage = %J::STAGE, job_id, error = %e, "failed to ack job");
            }
            if let Err(e) = ctx.queue.clear_dedup(&delivery.job).await {
                warn!(stage = %J::STAGE, job_id, error = %e, "failed to clear dedup key");
            }
        }
        Err(e) if e.is_terminal() => {
            error!(stage = %J::STAGE, job_id, error = %e, "job failed terminally");
            let message = e.to_string();
            J::fail_entity(Arc::clone(&ctx), delivery.job.clone(), message.clone()).await;
            if let Err(dlq_err) = ctx.queue.dlq(&delivery, &message).await {
                error!(stage = %J::STAGE, job_id, error = %dlq_err, "failed to park job in DLQ");
            }
            ctx.queue.clear_dedup(&delivery.job).await.ok();
        }
        Err(e) => {
            let attempts = ctx
                .queue
                .increment_retry(J::STAGE, &delivery.message_id)
                .await
                .unwrap_or(u32::MAX);
            let max_retries = ctx.queue.max_retries();

            if attempts >= max_retries {
                warn!(stage = %J::STAGE, job_id, attempts, "retry budget exhausted");
                let message = format!("failed after {attempts} attempts: {e}");
                J::fail_entity(Arc::clone(&ctx), delivery.job.clone(), message.clone()).await;
                if let Err(dlq_err) = ctx.queue.dlq(&delivery, &message).await {
                    error!(stage = %J::STAGE, job_id, error = %dlq_err, "failed to park job in DLQ");
                }
                ctx.queue.clear_dedup(&delivery.job).await.ok();
            } else {
                // Message stays pending; the claim scan redelivers it
                // after an idle window that doubles with each delivery.
                info!(
                    stage = %J::STAGE,
                    job_id,
                    attempt = attempts,
                    max_retries,
                    error = %e,
                    "job will be retried"
                );
            }
        }
    }
}
