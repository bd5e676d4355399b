//! Service error types.

use thiserror::Error;

use crate::storage::StoreError;

/// Errors reading or writing the persisted lifecycle state.
#[derive(Debug, Error)]
pub enum StateError {
    /// State file could not be read or written.
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// State file content is not valid.
    #[error("state file is malformed: {0}")]
    Format(#[from] serde_json::Error),
}

/// Errors surfaced by the lifecycle service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Event store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Lifecycle state could not be persisted.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// `start` called while the ingest worker is running.
    #[error("service already started")]
    AlreadyStarted,
}
