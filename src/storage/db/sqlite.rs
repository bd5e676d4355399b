//! SQLite backend implementation using sqlx.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::{ConnectOptions, SqliteConnection};

use crate::storage::StoreError;

/// How long a statement waits on a locked database before failing.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection options for the event store.
///
/// - WAL journal mode so readers never block the writer
/// - `FULL` synchronous mode: a committed insert is on disk before it returns
/// - Create database if not exists
pub fn connect_options(path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(DEFAULT_BUSY_TIMEOUT)
        .create_if_missing(true)
}

/// Open the single store connection.
pub async fn open_connection(path: &Path) -> Result<SqliteConnection, StoreError> {
    connect_options(path)
        .connect()
        .await
        .map_err(StoreError::OpenFailure)
}
