//! AES-256-GCM column encryption for designated ledger columns.
//!
//! When a master key is configured, writes must encrypt or fail (fail-closed).
//! Plaintext operation is an explicit policy choice and is logged as such.
//! Values are sanitized before encryption, so a lost key never exposes a
//! secret: decryption failure degrades to an opaque marker, not a leak.

use crate::error::LedgerError;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};

/// Wire prefix for encrypted column values.
const CIPHERTEXT_PREFIX: &str = "aesgcm:v1:";

/// Placeholder returned when a ciphertext cannot be decrypted.
pub const UNRECOVERABLE: &str = "[unrecoverable]";

/// Whether the ledger encrypts designated columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionPolicy {
    /// Master key configured; writes must encrypt or fail.
    Encrypted,
    /// Explicitly chosen plaintext operation.
    Plaintext,
}

/// Column cipher derived from the configured master key.
#[derive(Clone)]
pub enum ColumnCipher {
    Plaintext,
    Aes(Box<Aes256Gcm>),
}

impl ColumnCipher {
    /// Build from a 64-hex-character master key.
    pub fn from_master_key(hex_key: &str) -> Result<Self, LedgerError> {
        let trimmed = hex_key.trim();
        if trimmed.len() != 64 {
            return Err(LedgerError::MasterKey(format!(
                "expected 64 hex characters, got {}",
                trimmed.len()
            )));
        }
        let bytes = hex::decode(trimmed)
            .map_err(|e| LedgerError::MasterKey(format!("not valid hex: {e}")))?;
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self::Aes(Box::new(Aes256Gcm::new(key))))
    }

    /// Explicit plaintext policy. The choice is logged once here.
    pub fn plaintext() -> Self {
        tracing::warn!("ledger column encryption disabled by explicit plaintext policy");
        Self::Plaintext
    }

    pub fn policy(&self) -> EncryptionPolicy {
        match self {
            Self::Plaintext => EncryptionPolicy::Plaintext,
            Self::Aes(_) => EncryptionPolicy::Encrypted,
        }
    }

    /// Encrypt a sanitized value for storage. Fail-closed: with a key
    /// configured, any failure aborts the write.
    pub fn seal(&self, sanitized: &str) -> Result<String, LedgerError> {
        match self {
            Self::Plaintext => Ok(sanitized.to_string()),
            Self::Aes(cipher) => {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let ciphertext = cipher
                    .encrypt(&nonce, sanitized.as_bytes())
                    .map_err(|e| LedgerError::Encryption(e.to_string()))?;
                Ok(format!(
                    "{}{}:{}",
                    CIPHERTEXT_PREFIX,
                    hex::encode(nonce),
                    hex::encode(ciphertext)
                ))
            }
        }
    }

    /// Decrypt a stored value. Plaintext rows (written before encryption was
    /// enabled) pass through; undecryptable rows come back as an opaque
    /// marker since the plaintext was already sanitized when written.
    pub fn open(&self, stored: &str) -> String {
        let Some(rest) = stored.strip_prefix(CIPHERTEXT_PREFIX) else {
            return stored.to_string();
        };
        match self {
            Self::Plaintext => UNRECOVERABLE.to_string(),
            Self::Aes(cipher) => {
                let mut parts = rest.splitn(2, ':');
                let (Some(nonce_hex), Some(ct_hex)) = (parts.next(), parts.next()) else {
                    return UNRECOVERABLE.to_string();
                };
                let (Ok(nonce), Ok(ct)) = (hex::decode(nonce_hex), hex::decode(ct_hex)) else {
                    return UNRECOVERABLE.to_string();
                };
                if nonce.len() != 12 {
                    return UNRECOVERABLE.to_string();
                }
                cipher
                    .decrypt(Nonce::from_slice(&nonce), ct.as_ref())
                    .ok()
                    .and_then(|plain| String::from_utf8(plain).ok())
                    .unwrap_or_else(|| UNRECOVERABLE.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ColumnCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plaintext => f.write_str("ColumnCipher::Plaintext"),
            Self::Aes(_) => f.write_str("ColumnCipher::Aes256Gcm"),
        }
    }
}

#[cfg(test)]
#[path = "crypto_tests.rs"]
mod tests;
