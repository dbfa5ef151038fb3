//! Redis Streams job queue for the clip pipeline.
//!
//! One stream per stage, one consumer group, idempotency-keyed dedup on
//! enqueue, retry counters with a bounded budget, and a per-stage dead
//! letter queue.

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::{AnalyzeInput, AnalyzeJob, DownloadJob, QueueJob, RenderJob, Stage, TranscribeJob};
pub use queue::{Delivery, JobQueue, QueueConfig};
