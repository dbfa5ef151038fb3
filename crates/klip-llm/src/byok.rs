//! Server-side ephemeral BYOK key cache.
//!
//! User-supplied provider keys ride along through the pipeline in Redis,
//! encrypted with the platform secret and expiring after five minutes so
//! nothing lingers even if a pipeline crashes. Keys are never logged.

use std::fmt;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{info, warn};

use crate::crypto::{decrypt_token, encrypt_token};
use crate::error::{LlmError, LlmResult};

const BYOK_KEY_PREFIX: &str = "byok:";
const BYOK_TTL_SECONDS: u64 = 300;

/// Providers a user can bring a key for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByokProvider {
    Gemini,
    Openai,
    Anthropic,
}

impl ByokProvider {
    pub const ALL: [ByokProvider; 3] =
        [ByokProvider::Gemini, ByokProvider::Openai, ByokProvider::Anthropic];

    pub fn as_str(self) -> &'static str {
        match self {
            ByokProvider::Gemini => "gemini",
            ByokProvider::Openai => "openai",
            ByokProvider::Anthropic => "anthropic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gemini" => Some(ByokProvider::Gemini),
            "openai" => Some(ByokProvider::Openai),
            "anthropic" => Some(ByokProvider::Anthropic),
            _ => None,
        }
    }
}

impl fmt::Display for ByokProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Encrypted-at-rest, short-TTL key cache.
#[derive(Clone)]
pub struct ByokCache {
    conn: ConnectionManager,
    secret_hex: String,
}

impl ByokCache {
    /// `secret_hex` is the 64-hex-char platform token secret.
    pub fn new(conn: ConnectionManager, secret_hex: String) -> LlmResult<Self> {
        if secret_hex.len() != 64 || hex::decode(&secret_hex).is_err() {
            return Err(LlmError::InvalidSecret(
                "platform token secret must be 64 hex characters".to_string(),
            ));
        }
        Ok(Self { conn, secret_hex })
    }

    fn redis_key(user_id: &str, provider: ByokProvider) -> String {
        format!("{BYOK_KEY_PREFIX}{user_id}:{provider}")
    }

    /// Encrypt and store a key with the standard TTL.
    pub async fn set(
        &self,
        user_id: &str,
        provider: ByokProvider,
        plaintext_key: &str,
    ) -> LlmResult<()> {
        let encrypted = encrypt_token(plaintext_key, &self.secret_hex)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::redis_key(user_id, provider), encrypted, BYOK_TTL_SECONDS)
            .await?;
        info!(user_id, %provider, ttl = BYOK_TTL_SECONDS, "cached BYOK key");
        Ok(())
    }

    /// Read a key without deleting it; the same key may serve several
    /// calls within one pipeline run. Returns `None` on expiry or any
    /// retrieval failure.
    pub async fn peek(&self, user_id: &str, provider: ByokProvider) -> Option<String> {
        let mut conn = self.conn.clone();
        let encrypted: Option<String> = match conn.get(Self::redis_key(user_id, provider)).await {
            Ok(value) => value,
            Err(e) => {
                warn!(user_id, %provider, error = %e, "BYOK key retrieval failed");
                return None;
            }
        };
        let encrypted = encrypted?;

        match decrypt_token(&encrypted, &self.secret_hex) {
            Ok(plaintext) => {
                info!(user_id, %provider, "retrieved BYOK key");
                Some(plaintext)
            }
            Err(e) => {
                warn!(user_id, %provider, error = %e, "BYOK key decryption failed");
                None
            }
        }
    }

    /// Remove all of a user's keys, for every provider.
    pub async fn clear(&self, user_id: &str) -> LlmResult<()> {
        let mut conn = self.conn.clone();
        for provider in ByokProvider::ALL {
            let _: () = conn.del(Self::redis_key(user_id, provider)).await?;
        }
        info!(user_id, "cleared BYOK keys");
        Ok(())
    }

    /// Whether the user has any key cached.
    pub async fn has_any(&self, user_id: &str) -> LlmResult<bool> {
        let mut conn = self.conn.clone();
        for provider in ByokProvider::ALL {
            let exists: bool = conn.exists(Self::redis_key(user_id, provider)).await?;
            if exists {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_round_trip() {
        for provider in ByokProvider::ALL {
            assert_eq!(ByokProvider::parse(provider.as_str()), Some(provider));
        }
        assert_eq!(ByokProvider::parse("mistral"), None);
    }

    #[test]
    fn redis_key_layout() {
        assert_eq!(
            ByokCache::redis_key("user-1", ByokProvider::Gemini),
            "byok:user-1:gemini"
        );
    }
}
