//! S3-compatible object storage for source videos, rendered clips and
//! thumbnails, plus the deterministic key scheme.

pub mod client;
pub mod error;
pub mod paths;

pub use client::{StorageClient, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use paths::{clip_key, source_key, thumbnail_key};
