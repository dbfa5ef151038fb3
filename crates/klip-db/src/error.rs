//! Database error types.

use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// The requested transition is not in the status machine at all.
    #[error("illegal status transition for {entity} {id}: {from} -> {to}")]
    IllegalTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    /// The row moved out from under us: its stored status no longer
    /// matches what the caller expected.
    #[error("stale status for {entity} {id}: expected {expected}")]
    StaleStatus {
        entity: &'static str,
        id: String,
        expected: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Status-machine violations are programming or concurrency faults,
    /// not conditions a queue retry can fix.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DbError::IllegalTransition { .. } | DbError::StaleStatus { .. }
        )
    }
}
