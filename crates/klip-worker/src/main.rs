//! Clip pipeline worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use klip_worker::{StageExecutor, WorkerConfig, WorkerContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,klip=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    info!("starting klip-worker");

    let config = WorkerConfig::from_env();
    info!(
        download = config.download_concurrency,
        transcribe = config.transcribe_concurrency,
        analyze = config.analyze_concurrency,
        render = config.render_concurrency,
        render_rate_per_minute = config.render_rate_per_minute,
        "worker config loaded"
    );

    let ctx = Arc::new(
        WorkerContext::new(config)
            .await
            .context("failed to build worker context")?,
    );

    let executor = Arc::new(StageExecutor::new(ctx));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown signal received");
        signal_executor.shutdown();
    });

    executor.run().await.context("executor error")?;

    info!("worker shutdown complete");
    Ok(())
}
