//! Storage builder and handles.
//!
//! Provides a builder pattern for constructing the storage layer
//! and a handles struct for accessing the store facade.

use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;

use crate::storage::StoreError;
use crate::storage::actor::StoreActor;
use crate::storage::facades::SqliteEventStore;

/// Default channel capacity for store commands.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Builder for constructing the storage layer.
pub struct StorageBuilder {
    db_path: PathBuf,
    channel_capacity: usize,
}

impl StorageBuilder {
    /// Create a new storage builder for the database file at `db_path`.
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Set the channel capacity for store commands.
    ///
    /// Callers wait (they are not dropped) when the channel is full.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Open the store and spawn its actor.
    pub async fn build(self) -> Result<StorageHandles, StoreError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = self.db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Internal(format!(
                    "failed to create database directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let (actor_handle, tx) = StoreActor::spawn(&self.db_path, self.channel_capacity).await?;
        tracing::info!(path = %self.db_path.display(), "Event store opened");

        Ok(StorageHandles {
            store: SqliteEventStore::new(tx),
            actor_handle: Some(actor_handle),
        })
    }
}

/// Handles to the storage layer.
pub struct StorageHandles {
    /// Cloneable store facade.
    pub store: SqliteEventStore,
    /// Internal actor handle for graceful shutdown.
    actor_handle: Option<JoinHandle<()>>,
}

impl StorageHandles {
    /// Gracefully shutdown the storage layer.
    ///
    /// Commands queued before this call still run; the actor then checkpoints
    /// the WAL and closes the connection.
    pub async fn shutdown(mut self) -> Result<(), StoreError> {
        self.store.shutdown().await?;

        if let Some(handle) = self.actor_handle.take() {
            handle
                .await
                .map_err(|e| StoreError::Internal(format!("failed to join store actor: {e}")))?;
        }

        Ok(())
    }
}

impl Drop for StorageHandles {
    fn drop(&mut self) {
        // The actor exits on its own once every facade clone is gone.
        if let Some(handle) = self.actor_handle.take() {
            let store = self.store.clone();
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    let _ = store.shutdown().await;
                    let _ = handle.await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EventStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_storage_reopen_keeps_records() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("reopen.sqlite3");

        {
            let handles = StorageBuilder::new(&db_path).build().await.unwrap();
            for i in 0..5u8 {
                handles.store.insert(vec![i + 1]).await.unwrap();
            }
            handles.shutdown().await.unwrap();
        }

        let handles = StorageBuilder::new(&db_path).build().await.unwrap();
        assert_eq!(handles.store.count().await.unwrap(), 5);
        handles.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_builder_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/deeper/store.sqlite3");

        let handles = StorageBuilder::new(&db_path)
            .channel_capacity(8)
            .build()
            .await
            .unwrap();
        assert!(db_path.exists());
        handles.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_failure_on_directory_path() {
        let dir = tempdir().unwrap();
        let result = StorageBuilder::new(dir.path()).build().await;
        assert!(matches!(result, Err(StoreError::OpenFailure(_))));
    }
}
