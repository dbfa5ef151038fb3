//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrent download jobs
    pub download_concurrency: usize,
    /// Concurrent transcription jobs
    pub transcribe_concurrency: usize,
    /// Concurrent analysis jobs
    pub analyze_concurrency: usize,
    /// Concurrent render jobs (FFmpeg-heavy, keep low)
    pub render_concurrency: usize,
    /// Render starts admitted per minute across the whole process
    pub render_rate_per_minute: u32,
    /// Postgres connection string
    pub database_url: String,
    /// Connection pool size
    pub db_max_connections: u32,
    /// Work directory for temporary files
    pub work_dir: String,
    /// How often each stage scans for orphaned pending messages
    pub claim_interval: Duration,
    /// Minimum idle time before a pending message can be claimed
    pub claim_min_idle: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            download_concurrency: 2,
            transcribe_concurrency: 2,
            analyze_concurrency: 2,
            render_concurrency: 3,
            render_rate_per_minute: 10,
            database_url: "postgres://localhost:5432/klipmaker".to_string(),
            db_max_connections: 10,
            work_dir: "/tmp/klipmaker".to_string(),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            download_concurrency: env_parse("WORKER_DOWNLOAD_CONCURRENCY")
                .unwrap_or(defaults.download_concurrency),
            transcribe_concurrency: env_parse("WORKER_TRANSCRIBE_CONCURRENCY")
                .unwrap_or(defaults.transcribe_concurrency),
            analyze_concurrency: env_parse("WORKER_ANALYZE_CONCURRENCY")
                .unwrap_or(defaults.analyze_concurrency),
            render_concurrency: env_parse("WORKER_RENDER_CONCURRENCY")
                .unwrap_or(defaults.render_concurrency),
            render_rate_per_minute: env_parse("WORKER_RENDER_RATE_PER_MINUTE")
                .unwrap_or(defaults.render_rate_per_minute),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            db_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.db_max_connections),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or(defaults.work_dir),
            claim_interval: Duration::from_secs(
                env_parse("WORKER_CLAIM_INTERVAL_SECS").unwrap_or(30),
            ),
            claim_min_idle: Duration::from_secs(
                env_parse("WORKER_CLAIM_MIN_IDLE_SECS").unwrap_or(300),
            ),
            shutdown_timeout: Duration::from_secs(
                env_parse("WORKER_SHUTDOWN_TIMEOUT_SECS").unwrap_or(30),
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
