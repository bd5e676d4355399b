//! Store actor with the dedicated connection and MPSC channel.
//!
//! Single-owner pattern: one task owns the SQLite connection and processes
//! commands in arrival order. Every statement against the handle (prepare,
//! bind, step, cursor iteration) happens inside this task, so callers get a
//! total order of handle access without row-level locks. Read cursors are
//! stepped to completion here and handed back as owned rows.

use std::path::Path;

use sqlx::{Connection, SqliteConnection};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::storage::StoreError;
use crate::storage::db::open_connection;
use crate::storage::schema::init_schema;
use crate::storage::types::{EventRecord, check_payload};

// =============================================================================
// Statements
// =============================================================================

const INSERT_SQL: &str = "INSERT INTO Location (location) VALUES (?1)";
const COUNT_SQL: &str = "SELECT COUNT(*) FROM Location";
const READ_FIRST_SQL: &str = "SELECT _id, location FROM Location ORDER BY _id ASC LIMIT 1";
const READ_ALL_SQL: &str = "SELECT _id, location FROM Location ORDER BY _id ASC";
const CLEAR_SQL: &str = "DELETE FROM Location";
const CLEAR_THROUGH_SQL: &str = "DELETE FROM Location WHERE _id <= ?1";
const CHECKPOINT_SQL: &str = "PRAGMA wal_checkpoint(TRUNCATE)";

// =============================================================================
// Commands
// =============================================================================

/// Reply channel carried by every command.
pub type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

/// Commands sent to the store actor.
#[derive(Debug)]
pub enum Command {
    /// Append one record.
    Insert { payload: Vec<u8>, reply: Reply<()> },
    /// Append records atomically (all or nothing).
    InsertAll {
        payloads: Vec<Vec<u8>>,
        reply: Reply<()>,
    },
    /// Count rows.
    Count { reply: Reply<i64> },
    /// Record with the smallest sequence id.
    ReadFirst { reply: Reply<Option<EventRecord>> },
    /// All records in ascending sequence order.
    ReadAll { reply: Reply<Vec<EventRecord>> },
    /// Delete every row; replies with the number removed.
    Clear { reply: Reply<u64> },
    /// Read and delete every row as one step.
    TakeAll { reply: Reply<Vec<EventRecord>> },
    /// Force WAL checkpoint.
    Checkpoint { reply: Reply<()> },
    /// Graceful shutdown.
    Shutdown,
}

// =============================================================================
// Actor
// =============================================================================

/// Owner of the store connection.
pub struct StoreActor {
    conn: SqliteConnection,
    rx: mpsc::Receiver<Command>,
}

impl StoreActor {
    /// Open the database, ensure the schema and spawn the actor task.
    ///
    /// Open and schema errors are returned here, before any command is accepted.
    pub async fn spawn(
        db_path: &Path,
        channel_capacity: usize,
    ) -> Result<(JoinHandle<()>, mpsc::Sender<Command>), StoreError> {
        let mut conn = open_connection(db_path).await?;
        init_schema(&mut conn).await?;

        let (tx, rx) = mpsc::channel(channel_capacity);
        let actor = StoreActor { conn, rx };
        let handle = tokio::spawn(actor.run());

        Ok((handle, tx))
    }

    async fn run(mut self) {
        tracing::info!("StoreActor started");

        while let Some(cmd) = self.rx.recv().await {
            if self.handle_command(cmd).await {
                break; // Shutdown requested
            }
        }

        if let Err(e) = self.checkpoint().await {
            tracing::warn!(error = %e, "Final checkpoint failed");
        }
        if let Err(e) = self.conn.close().await {
            tracing::warn!(error = %e, "Failed to close store connection");
        }

        tracing::info!("StoreActor stopped");
    }

    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Insert { payload, reply } => {
                let _ = reply.send(self.insert(&payload).await);
            }
            Command::InsertAll { payloads, reply } => {
                let _ = reply.send(self.insert_all(&payloads).await);
            }
            Command::Count { reply } => {
                let _ = reply.send(self.count().await);
            }
            Command::ReadFirst { reply } => {
                let _ = reply.send(self.read_first().await);
            }
            Command::ReadAll { reply } => {
                let _ = reply.send(self.read_all().await);
            }
            Command::Clear { reply } => {
                let _ = reply.send(self.clear().await);
            }
            Command::TakeAll { reply } => {
                let _ = reply.send(self.take_all().await);
            }
            Command::Checkpoint { reply } => {
                let _ = reply.send(self.checkpoint().await);
            }
            Command::Shutdown => {
                tracing::info!("StoreActor shutting down");
                return true;
            }
        }
        false
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    async fn insert(&mut self, payload: &[u8]) -> Result<(), StoreError> {
        check_payload(payload)?;

        sqlx::query(INSERT_SQL)
            .bind(payload)
            .execute(&mut self.conn)
            .await
            .map_err(StoreError::from_statement)?;

        Ok(())
    }

    /// Insert a batch inside one `BEGIN EXCLUSIVE` transaction.
    ///
    /// A single payload skips the transaction. Any per-row failure rolls the
    /// whole batch back; no partial batch persists.
    async fn insert_all(&mut self, payloads: &[Vec<u8>]) -> Result<(), StoreError> {
        match payloads {
            [] => Ok(()),
            [single] => self.insert(single).await,
            _ => {
                self.execute_raw("BEGIN EXCLUSIVE").await?;

                for (index, payload) in payloads.iter().enumerate() {
                    if let Err(e) = self.insert(payload).await {
                        tracing::error!(
                            error = %e,
                            index,
                            count = payloads.len(),
                            "Batch insert failed, rolling back"
                        );
                        self.rollback().await;
                        return Err(e);
                    }
                }

                if let Err(e) = self.execute_raw("COMMIT").await {
                    tracing::error!(error = %e, count = payloads.len(), "Batch commit failed");
                    self.rollback().await;
                    return Err(e);
                }

                tracing::debug!(count = payloads.len(), "Batch inserted");
                Ok(())
            }
        }
    }

    async fn rollback(&mut self) {
        if let Err(e) = self.execute_raw("ROLLBACK").await {
            tracing::error!(error = %e, "Rollback failed");
        }
    }

    async fn clear(&mut self) -> Result<u64, StoreError> {
        let result = sqlx::query(CLEAR_SQL)
            .execute(&mut self.conn)
            .await
            .map_err(StoreError::from_statement)?;

        tracing::debug!(deleted = result.rows_affected(), "Store cleared");
        Ok(result.rows_affected())
    }

    /// Read every row and delete exactly those rows in one transaction.
    ///
    /// No other command runs between the read and the delete, and the
    /// delete is bounded by the largest id read.
    async fn take_all(&mut self) -> Result<Vec<EventRecord>, StoreError> {
        self.execute_raw("BEGIN IMMEDIATE").await?;

        let records = match self.read_all().await {
            Ok(records) => records,
            Err(e) => {
                self.rollback().await;
                return Err(e);
            }
        };
        let Some(last) = records.last().map(|r| r.sequence_id) else {
            self.rollback().await;
            return Ok(records);
        };

        let deleted = sqlx::query(CLEAR_THROUGH_SQL)
            .bind(last)
            .execute(&mut self.conn)
            .await
            .map_err(StoreError::from_statement);
        if let Err(e) = deleted {
            self.rollback().await;
            return Err(e);
        }

        if let Err(e) = self.execute_raw("COMMIT").await {
            tracing::error!(error = %e, count = records.len(), "Take commit failed");
            self.rollback().await;
            return Err(e);
        }

        tracing::debug!(count = records.len(), "Store taken");
        Ok(records)
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    async fn count(&mut self) -> Result<i64, StoreError> {
        sqlx::query_scalar(COUNT_SQL)
            .fetch_one(&mut self.conn)
            .await
            .map_err(StoreError::from_statement)
    }

    async fn read_first(&mut self) -> Result<Option<EventRecord>, StoreError> {
        let row: Option<(i64, Vec<u8>)> = sqlx::query_as(READ_FIRST_SQL)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(StoreError::from_statement)?;

        Ok(row.map(EventRecord::from))
    }

    async fn read_all(&mut self) -> Result<Vec<EventRecord>, StoreError> {
        let rows: Vec<(i64, Vec<u8>)> = sqlx::query_as(READ_ALL_SQL)
            .fetch_all(&mut self.conn)
            .await
            .map_err(StoreError::from_statement)?;

        Ok(rows.into_iter().map(EventRecord::from).collect())
    }

    // =========================================================================
    // Maintenance Operations
    // =========================================================================

    async fn checkpoint(&mut self) -> Result<(), StoreError> {
        self.execute_raw(CHECKPOINT_SQL).await?;
        tracing::debug!("WAL checkpoint completed");
        Ok(())
    }

    async fn execute_raw(&mut self, sql: &str) -> Result<(), StoreError> {
        sqlx::query(sql)
            .execute(&mut self.conn)
            .await
            .map_err(StoreError::from_statement)?;
        Ok(())
    }
}
