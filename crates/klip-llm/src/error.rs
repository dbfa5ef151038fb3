//! LLM client and router error types.

use thiserror::Error;

pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Non-2xx response from the provider.
    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Provider response had no content")]
    EmptyResponse,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Response parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// PLATFORM_TOKEN_SECRET is missing or malformed.
    #[error("Invalid platform token secret: {0}")]
    InvalidSecret(String),

    /// The registry has no platform client for the resolved provider.
    #[error("No client configured for provider {0}")]
    NoClient(String),

    /// Encryption or decryption of a cached key failed. Never carries
    /// key material.
    #[error("Token crypto failure: {0}")]
    Crypto(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LlmError {
    /// Whether this is a credential rejection (triggers the BYOK to
    /// platform-key fallback).
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, LlmError::Api { status: 401 | 403, .. })
    }
}
