//! Lifecycle engine error types.

use lrpgrid_core::ActualLrpKey;
use lrpgrid_state::StoreError;
use thiserror::Error;

use crate::client::ClientError;

/// Errors returned by lifecycle operations.
#[derive(Debug, Error)]
pub enum BbsError {
    #[error("Index {index} too large for desired number {instances} of instances")]
    IndexTooLarge { index: u32, instances: u32 },

    #[error("actual lrp {key} cannot be claimed")]
    CannotBeClaimed { key: ActualLrpKey },

    #[error("actual lrp {key} cannot be started")]
    CannotBeStarted { key: ActualLrpKey },

    /// Lost an optimistic-concurrency race, or the caller does not own
    /// the record it tried to remove. Safe to retry after re-reading.
    #[error("store comparison failed for {0}")]
    ComparisonFailed(String),

    #[error("state store error: {0}")]
    Store(StoreError),

    #[error("actual lrp codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("cell client error: {0}")]
    Cell(#[from] ClientError),
}

impl From<StoreError> for BbsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::VersionMismatch { key, .. } => BbsError::ComparisonFailed(key),
            other => BbsError::Store(other),
        }
    }
}

impl BbsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BbsError::Store(StoreError::NotFound(_)))
    }
}

pub type BbsResult<T> = Result<T, BbsError>;
