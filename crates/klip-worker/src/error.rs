//! Worker error types and the terminal/transient split that drives
//! retry handling.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// A condition that retrying cannot fix (entity in an impossible
    /// state, missing prerequisite data).
    #[error("{0}")]
    Terminal(String),

    #[error(transparent)]
    Fetch(#[from] klip_fetch::FetchError),

    #[error(transparent)]
    Media(#[from] klip_media::MediaError),

    #[error(transparent)]
    Llm(#[from] klip_llm::LlmError),

    #[error(transparent)]
    Analysis(#[from] klip_analysis::AnalysisError),

    #[error(transparent)]
    Storage(#[from] klip_storage::StorageError),

    #[error(transparent)]
    Db(#[from] klip_db::DbError),

    #[error(transparent)]
    Queue(#[from] klip_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::Terminal(msg.into())
    }

    /// Terminal failures mark the entity failed and go straight to the
    /// DLQ; everything else is retried within the queue's budget.
    pub fn is_terminal(&self) -> bool {
        match self {
            WorkerError::Terminal(_) => true,
            WorkerError::Fetch(e) => e.is_terminal(),
            WorkerError::Analysis(e) => e.is_terminal(),
            WorkerError::Db(e) => e.is_terminal(),
            WorkerError::Queue(e) => matches!(e, klip_queue::QueueError::InvalidPayload(_)),
            _ => false,
        }
    }
}
