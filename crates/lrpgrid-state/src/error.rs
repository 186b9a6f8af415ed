//! Error types for the lrpgrid state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("key already exists: {0}")]
    AlreadyExists(String),

    #[error("version mismatch on {key}: expected {expected}, found {actual}")]
    VersionMismatch {
        key: String,
        expected: u64,
        actual: u64,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
