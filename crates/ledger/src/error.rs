use thiserror::Error;

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database not initialized: {0}")]
    Init(String),

    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid master key: {0}")]
    MasterKey(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("idempotency key re-used with a different request fingerprint")]
    IdempotencyConflict,

    #[error("not found: {0}")]
    NotFound(String),
}

impl LedgerError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { field, message: message.into() }
    }

    /// Whether this maps to an HTTP conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::IdempotencyConflict)
    }
}
