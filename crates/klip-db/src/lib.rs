//! Postgres persistence for the clip pipeline.
//!
//! Status machines are enforced at this boundary: every transition is a
//! guarded `UPDATE ... WHERE status = expected`, and clip creation is
//! transactional against the video still being in `analyzing`.

pub mod error;
pub mod models;
pub mod pool;
pub mod repos;

pub use error::{DbError, DbResult};
pub use models::{ClipRow, NewClip, NewUsageRecord, NewVideo, TranscriptRow, VideoRow};
pub use pool::{connect, run_migrations};
pub use repos::{ClipRepo, TranscriptRepo, UsageRepo, VideoRepo};
