//! Redis Streams job queue, one stream per pipeline stage.

use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::{QueueJob, Stage};

/// Dedup keys outlive any sane enqueue burst but not a re-run a day later.
const DEDUP_TTL_SECS: u64 = 3600;

/// Retry counters expire after a day.
const RETRY_TTL_SECS: i64 = 86400;

/// How many pending entries one claim scan inspects.
const PENDING_SCAN_LIMIT: usize = 50;

/// Cap on backoff doublings so a much-redelivered message still comes
/// back within the retry budget.
const MAX_BACKOFF_DOUBLINGS: u64 = 5;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    /// Prefix for stream, group, dedup and retry keys
    pub namespace: String,
    pub consumer_group: String,
    /// Max delivery attempts before the DLQ
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            namespace: "klip".to_string(),
            consumer_group: "klip:workers".to_string(),
            max_retries: 3,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            namespace: std::env::var("QUEUE_NAMESPACE").unwrap_or(defaults.namespace),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

/// A consumed message awaiting ack.
#[derive(Debug, Clone)]
pub struct Delivery<J> {
    pub message_id: String,
    pub job: J,
}

/// Job queue client.
#[derive(Clone)]
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    fn stream_name(&self, stage: Stage) -> String {
        format!("{}:jobs:{}", self.config.namespace, stage)
    }

    fn dlq_name(&self, stage: Stage) -> String {
        format!("{}:dlq:{}", self.config.namespace, stage)
    }

    /// Create the consumer group on every stage stream.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        for stage in Stage::ALL {
            let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(self.stream_name(stage))
                .arg(&self.config.consumer_group)
                .arg("$")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;

            match result {
                Ok(_) => info!(%stage, group = %self.config.consumer_group, "created consumer group"),
                Err(e) if e.to_string().contains("BUSYGROUP") => {
                    debug!(%stage, "consumer group already exists");
                }
                Err(e) => return Err(QueueError::Redis(e)),
            }
        }
        Ok(())
    }

    /// Enqueue a job onto its stage stream, rejecting duplicates by
    /// idempotency key.
    pub async fn enqueue<J: QueueJob>(&self, job: &J) -> QueueResult<String> {
        job.validate()?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;
        let idempotency_key = job.idempotency_key();
        let dedup_key = format!("{}:dedup:{}", self.config.namespace, idempotency_key);

        // SET NX takes the dedup key atomically; two concurrent enqueues
        // of the same job cannot both pass.
        let acquired: bool = redis::cmd("SET")
            .arg(&dedup_key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(DEDUP_TTL_SECS)
            .query_async(&mut conn)
            .await?;
        if !acquired {
            warn!(key = %idempotency_key, "duplicate job rejected");
            return Err(QueueError::enqueue_failed(format!(
                "duplicate job: {idempotency_key}"
            )));
        }

        let xadd = redis::cmd("XADD")
            .arg(self.stream_name(J::STAGE))
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("key")
            .arg(&idempotency_key)
            .query_async::<String>(&mut conn)
            .await;
        let message_id = match xadd {
            Ok(id) => id,
            Err(e) => {
                // Release the key so the job can be enqueued again.
                conn.del::<_, ()>(&dedup_key).await.ok();
                return Err(QueueError::Redis(e));
            }
        };

        info!(stage = %J::STAGE, job_id = job.job_id(), message_id, "enqueued job");
        Ok(message_id)
    }

    /// Read new jobs for a stage. Malformed payloads are acked away so
    /// they can never wedge the stream.
    pub async fn consume<J: QueueJob>(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<Delivery<J>>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let reply: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(self.stream_name(J::STAGE))
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut deliveries = Vec::new();
        for stream_key in reply.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();
                let Some(redis::Value::BulkString(payload)) = entry.map.get("job") else {
                    warn!(message_id, "stream entry without job field");
                    self.ack(J::STAGE, &message_id).await.ok();
                    continue;
                };
                match serde_json::from_slice::<J>(payload) {
                    Ok(job) => {
                        debug!(stage = %J::STAGE, job_id = job.job_id(), "consumed job");
                        deliveries.push(Delivery { message_id, job });
                    }
                    Err(e) => {
                        warn!(message_id, error = %e, "unparseable job payload, acking away");
                        self.ack(J::STAGE, &message_id).await.ok();
                    }
                }
            }
        }
        Ok(deliveries)
    }

    /// Claim messages stuck pending longer than their redelivery
    /// threshold (crashed worker recovery). The threshold starts at
    /// `min_idle_ms` and doubles with each delivery, so retries back off
    /// exponentially.
    pub async fn claim_stale<J: QueueJob>(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<Delivery<J>>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: redis::streams::StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(self.stream_name(J::STAGE))
            .arg(&self.config.consumer_group)
            .arg("-")
            .arg("+")
            .arg(PENDING_SCAN_LIMIT)
            .query_async(&mut conn)
            .await?;

        let due: Vec<&str> = pending
            .ids
            .iter()
            .filter(|p| {
                p.last_delivered_ms as u64
                    >= redelivery_threshold_ms(min_idle_ms, p.times_delivered as u64)
            })
            .map(|p| p.id.as_str())
            .take(count)
            .collect();
        if due.is_empty() {
            return Ok(Vec::new());
        }

        let mut claim = redis::cmd("XCLAIM");
        claim
            .arg(self.stream_name(J::STAGE))
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms);
        for id in &due {
            claim.arg(id);
        }
        let reply: redis::streams::StreamClaimReply = claim.query_async(&mut conn).await?;

        let mut deliveries = Vec::new();
        for entry in reply.ids {
            let message_id = entry.id.clone();
            let Some(redis::Value::BulkString(payload)) = entry.map.get("job") else {
                self.ack(J::STAGE, &message_id).await.ok();
                continue;
            };
            match serde_json::from_slice::<J>(payload) {
                Ok(job) => {
                    info!(stage = %J::STAGE, job_id = job.job_id(), "claimed stale job");
                    deliveries.push(Delivery { message_id, job });
                }
                Err(e) => {
                    warn!(message_id, error = %e, "unparseable claimed payload, acking away");
                    self.ack(J::STAGE, &message_id).await.ok();
                }
            }
        }
        Ok(deliveries)
    }

    /// Drop a job's dedup key so the same logical work can be enqueued
    /// again before the TTL would have released it.
    pub async fn clear_dedup<J: QueueJob>(&self, job: &J) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let dedup_key = format!("{}:dedup:{}", self.config.namespace, job.idempotency_key());
        conn.del::<_, ()>(&dedup_key).await?;
        Ok(())
    }

    /// Acknowledge and delete a message.
    pub async fn ack(&self, stage: Stage, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(self.stream_name(stage))
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;
        redis::cmd("XDEL")
            .arg(self.stream_name(stage))
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!(%stage, message_id, "acked");
        Ok(())
    }

    /// Park a job in the stage DLQ and ack the original.
    pub async fn dlq<J: QueueJob>(
        &self,
        delivery: &Delivery<J>,
        error: &str,
    ) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(&delivery.job)?;

        redis::cmd("XADD")
            .arg(self.dlq_name(J::STAGE))
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(&delivery.message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(J::STAGE, &delivery.message_id).await?;
        warn!(stage = %J::STAGE, job_id = delivery.job.job_id(), error, "job parked in DLQ");
        Ok(())
    }

    /// Delivery attempts recorded so far for a message.
    pub async fn retry_count(&self, stage: Stage, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}:retry:{}:{}", self.config.namespace, stage, message_id);
        let count: Option<u32> = conn.get(&key).await?;
        Ok(count.unwrap_or(0))
    }

    /// Bump the retry counter, returning the new value.
    pub async fn increment_retry(&self, stage: Stage, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}:retry:{}:{}", self.config.namespace, stage, message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, RETRY_TTL_SECS).await?;
        Ok(count)
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Stage stream length, for monitoring.
    pub async fn len(&self, stage: Stage) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(self.stream_name(stage)).await?;
        Ok(len)
    }

    /// Stage DLQ length, for monitoring.
    pub async fn dlq_len(&self, stage: Stage) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(self.dlq_name(stage)).await?;
        Ok(len)
    }
}

/// Minimum idle time before a message with `times_delivered` deliveries
/// may be claimed again: `base_ms * 2^(deliveries - 1)`, capped.
fn redelivery_threshold_ms(base_ms: u64, times_delivered: u64) -> u64 {
    let doublings = times_delivered.saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS);
    base_ms.saturating_mul(1u64 << doublings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redelivery_backoff_doubles_per_delivery() {
        assert_eq!(redelivery_threshold_ms(300_000, 0), 300_000);
        assert_eq!(redelivery_threshold_ms(300_000, 1), 300_000);
        assert_eq!(redelivery_threshold_ms(300_000, 2), 600_000);
        assert_eq!(redelivery_threshold_ms(300_000, 3), 1_200_000);
    }

    #[test]
    fn redelivery_backoff_is_capped() {
        let capped = redelivery_threshold_ms(300_000, 100);
        assert_eq!(capped, 300_000 * (1 << MAX_BACKOFF_DOUBLINGS));

        // Saturates instead of overflowing on absurd bases.
        assert_eq!(redelivery_threshold_ms(u64::MAX, 3), u64::MAX);
    }
}
