//! Shared state handed to every stage handler.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use sqlx::PgPool;
use tracing::{info, warn};

use klip_db::pool::{connect, run_migrations};
use klip_fetch::Fetcher;
use klip_llm::{ByokCache, LlmRouter, PlatformKeys};
use klip_queue::JobQueue;
use klip_storage::StorageClient;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

/// Everything the stage handlers need: connections, clients and limits.
pub struct WorkerContext {
    pub config: WorkerConfig,
    pub pool: PgPool,
    pub queue: Arc<JobQueue>,
    pub storage: StorageClient,
    pub fetcher: Fetcher,
    pub router: LlmRouter,
    /// User key cache. Absent when PLATFORM_TOKEN_SECRET is not set;
    /// every run then uses platform keys.
    pub byok: Option<ByokCache>,
    /// Global admission limiter for render starts
    pub render_limiter: DefaultDirectRateLimiter,
}

impl WorkerContext {
    pub async fn new(config: WorkerConfig) -> WorkerResult<Self> {
        tokio::fs::create_dir_all(&config.work_dir).await?;

        let pool = connect(&config.database_url, config.db_max_connections).await?;
        run_migrations(&pool).await?;

        let queue = Arc::new(JobQueue::from_env()?);
        let storage = StorageClient::from_env()?;
        let fetcher = Fetcher::new()?;

        let platform_keys = PlatformKeys {
            cloudru: std::env::var("CLOUDRU_API_KEY").ok(),
            gemini: std::env::var("GEMINI_API_KEY").ok(),
            anthropic: std::env::var("ANTHROPIC_API_KEY").ok(),
            openai: std::env::var("OPENAI_API_KEY").ok(),
        };
        let router = LlmRouter::new(platform_keys)?;

        let byok = match std::env::var("PLATFORM_TOKEN_SECRET") {
            Ok(secret) => {
                let redis_url = std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string());
                let client = redis::Client::open(redis_url.as_str())
                    .map_err(klip_llm::LlmError::from)?;
                let conn = redis::aio::ConnectionManager::new(client)
                    .await
                    .map_err(klip_llm::LlmError::from)?;
                Some(ByokCache::new(conn, secret)?)
            }
            Err(_) => {
                warn!("PLATFORM_TOKEN_SECRET not set, user-key lookups disabled");
                None
            }
        };

        let per_minute =
            NonZeroU32::new(config.render_rate_per_minute).unwrap_or(NonZeroU32::MIN);
        let render_limiter = RateLimiter::direct(Quota::per_minute(per_minute));

        info!(work_dir = %config.work_dir, "worker context ready");

        Ok(Self {
            config,
            pool,
            queue,
            storage,
            fetcher,
            router,
            byok,
            render_limiter,
        })
    }
}
