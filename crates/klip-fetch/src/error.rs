//! Fetch error types.

use thiserror::Error;

pub type FetchResult<T> = Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    /// URL rejected before any request was made. Terminal, never retried.
    #[error("URL blocked: {0}")]
    Blocked(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(u32),

    #[error("Redirect {status} without Location header")]
    RedirectWithoutLocation { status: u16 },

    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("Download exceeded {limit} byte limit at {received} bytes")]
    TooLarge { received: u64, limit: u64 },

    /// Body did not start with a recognized video container signature.
    /// Terminal, never retried.
    #[error("Invalid video format (magic bytes check failed)")]
    MagicBytesMismatch,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Terminal errors must not be retried by the queue.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FetchError::Blocked(_)
                | FetchError::InvalidUrl(_)
                | FetchError::InvalidContentType(_)
                | FetchError::MagicBytesMismatch
        )
    }
}
