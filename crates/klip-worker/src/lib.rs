//! Clip pipeline worker.
//!
//! Consumes the four stage streams (download, transcribe, analyze,
//! render), runs each job with bounded per-stage concurrency, and settles
//! entities through the status machines in klip-db.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod retry;
pub mod stages;

pub use config::WorkerConfig;
pub use context::WorkerContext;
pub use error::{WorkerError, WorkerResult};
pub use executor::StageExecutor;
