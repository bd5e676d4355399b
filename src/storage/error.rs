//! Storage-specific error types.
//!
//! Every failed store operation surfaces a [`StoreError`]; the store itself
//! never retries. Retry policy lives in the delivery layer.

use thiserror::Error;

/// SQLite primary result code for a generic SQL error (bad statement, missing table).
const SQLITE_ERROR: &str = "1";

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened or the schema could not be ensured.
    #[error("failed to open store: {0}")]
    OpenFailure(#[source] sqlx::Error),

    /// A statement could not be prepared against the store handle.
    #[error("failed to prepare statement: {0}")]
    PrepareFailure(#[source] sqlx::Error),

    /// A bound value does not match the shape the table expects.
    #[error("bind mismatch: {0}")]
    BindMismatch(String),

    /// The transactional write or read failed (disk full, corruption, lock, ...).
    #[error("store i/o failure: {0}")]
    IoFailure(#[source] sqlx::Error),

    /// Failed to send command to the store actor.
    #[error("failed to send command to store actor")]
    ChannelSend,

    /// Internal error (e.g., reply channel dropped, task join failure).
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Classify an error raised while running a statement.
    pub(crate) fn from_statement(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(SQLITE_ERROR) => {
                Self::PrepareFailure(err)
            }
            _ => Self::IoFailure(err),
        }
    }
}
