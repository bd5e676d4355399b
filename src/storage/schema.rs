//! Database schema definitions.

use sqlx::SqliteConnection;

use crate::storage::StoreError;

/// Name of the single event table.
pub const TABLE_NAME: &str = "Location";

/// SQL statement for creating the event table.
///
/// `AUTOINCREMENT` keeps `_id` from being reused after `DELETE FROM`, even
/// across restarts (SQLite persists the high-water mark in `sqlite_sequence`).
pub const LOCATION_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS Location (
    _id      INTEGER PRIMARY KEY AUTOINCREMENT,
    location BLOB NOT NULL
);
"#;

/// Initialize the database schema.
///
/// Creates the event table if it doesn't exist. There are no migrations.
pub async fn init_schema(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    sqlx::query(LOCATION_TABLE_DDL)
        .execute(&mut *conn)
        .await
        .map_err(StoreError::OpenFailure)?;

    tracing::debug!(table = TABLE_NAME, "Database schema initialized");
    Ok(())
}
