//! At-rest encryption for cached provider keys.
//!
//! AES-256-GCM with a 12-byte nonce and 16-byte tag. The wire format is
//! `iv:ciphertext:tag`, all hex-encoded, so entries are printable and can
//! be stored in Redis string values.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};

use crate::error::{LlmError, LlmResult};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

fn load_key(secret_hex: &str) -> LlmResult<Key<Aes256Gcm>> {
    let bytes = hex::decode(secret_hex)
        .map_err(|_| LlmError::InvalidSecret("secret is not valid hex".to_string()))?;
    if bytes.len() != 32 {
        return Err(LlmError::InvalidSecret(
            "secret must be 32 bytes (64 hex characters)".to_string(),
        ));
    }
    Ok(*Key::<Aes256Gcm>::from_slice(&bytes))
}

/// Encrypt a plaintext token with the platform secret.
pub fn encrypt_token(plaintext: &str, secret_hex: &str) -> LlmResult<String> {
    let key = load_key(secret_hex)?;
    let cipher = Aes256Gcm::new(&key);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let sealed = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| LlmError::Crypto("encryption failed".to_string()))?;

    // aes-gcm appends the tag to the ciphertext; split it back out to
    // keep the three-part storage format.
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    Ok(format!(
        "{}:{}:{}",
        hex::encode(nonce),
        hex::encode(ciphertext),
        hex::encode(tag)
    ))
}

/// Decrypt a token previously produced by [`encrypt_token`].
pub fn decrypt_token(encrypted: &str, secret_hex: &str) -> LlmResult<String> {
    let key = load_key(secret_hex)?;

    let parts: Vec<&str> = encrypted.split(':').collect();
    if parts.len() != 3 {
        return Err(LlmError::Crypto(
            "invalid token format, expected iv:ciphertext:tag".to_string(),
        ));
    }

    let iv = hex::decode(parts[0]).map_err(|_| LlmError::Crypto("bad iv hex".to_string()))?;
    let ciphertext =
        hex::decode(parts[1]).map_err(|_| LlmError::Crypto("bad ciphertext hex".to_string()))?;
    let tag = hex::decode(parts[2]).map_err(|_| LlmError::Crypto("bad tag hex".to_string()))?;

    if iv.len() != IV_LEN {
        return Err(LlmError::Crypto(format!("invalid iv length: {}", iv.len())));
    }
    if tag.len() != TAG_LEN {
        return Err(LlmError::Crypto(format!("invalid tag length: {}", tag.len())));
    }

    let cipher = Aes256Gcm::new(&key);
    let mut sealed = ciphertext;
    sealed.extend_from_slice(&tag);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), sealed.as_ref())
        .map_err(|_| LlmError::Crypto("decryption failed".to_string()))?;

    String::from_utf8(plaintext).map_err(|_| LlmError::Crypto("plaintext is not UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn round_trip() {
        let token = "sk-user-provided-key-42";
        let encrypted = encrypt_token(token, SECRET).unwrap();
        assert_ne!(encrypted, token);
        assert!(!encrypted.contains(token));
        assert_eq!(decrypt_token(&encrypted, SECRET).unwrap(), token);
    }

    #[test]
    fn each_encryption_uses_a_fresh_nonce() {
        let a = encrypt_token("key", SECRET).unwrap();
        let b = encrypt_token("key", SECRET).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_short_secret() {
        let err = encrypt_token("key", "deadbeef").unwrap_err();
        assert!(matches!(err, LlmError::InvalidSecret(_)));
    }

    #[test]
    fn rejects_wrong_secret() {
        let other = "f".repeat(64);
        let encrypted = encrypt_token("key", SECRET).unwrap();
        let err = decrypt_token(&encrypted, &other).unwrap_err();
        assert!(matches!(err, LlmError::Crypto(_)));
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let encrypted = encrypt_token("key", SECRET).unwrap();
        let mut parts: Vec<String> = encrypted.split(':').map(String::from).collect();
        parts[1] = parts[1].replace(&parts[1][0..1].to_string(), "0");
        let tampered = parts.join(":");
        // Either the hex flip is a no-op (same char) or the tag check fails.
        if tampered != encrypted {
            assert!(decrypt_token(&tampered, SECRET).is_err());
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(decrypt_token("not-three-parts", SECRET).is_err());
        assert!(decrypt_token("aa:bb", SECRET).is_err());
    }
}
