//! User-facing storage facade.
//!
//! [`SqliteEventStore`] is a cheap, cloneable handle. Each call becomes one
//! command on the actor's channel and awaits its reply, so a returned `Ok`
//! means the actor has finished the statement.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::storage::actor::{Command, Reply};
use crate::storage::{EventRecord, EventStore, StoreError};

/// SQLite-backed event store handle.
#[derive(Clone)]
pub struct SqliteEventStore {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for SqliteEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEventStore").finish_non_exhaustive()
    }
}

impl SqliteEventStore {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| StoreError::ChannelSend)?;
        rx.await
            .map_err(|_| StoreError::Internal("store actor dropped reply".to_string()))?
    }

    /// Force a WAL checkpoint.
    pub async fn checkpoint(&self) -> Result<(), StoreError> {
        self.request(|reply| Command::Checkpoint { reply }).await
    }

    /// Ask the actor to stop after the commands already queued.
    pub(crate) async fn shutdown(&self) -> Result<(), StoreError> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| StoreError::ChannelSend)
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn insert(&self, payload: Vec<u8>) -> Result<(), StoreError> {
        self.request(|reply| Command::Insert { payload, reply })
            .await
    }

    async fn insert_all(&self, payloads: Vec<Vec<u8>>) -> Result<(), StoreError> {
        if payloads.is_empty() {
            return Ok(());
        }
        self.request(|reply| Command::InsertAll { payloads, reply })
            .await
    }

    async fn count(&self) -> Result<i64, StoreError> {
        self.request(|reply| Command::Count { reply }).await
    }

    async fn read_first(&self) -> Result<Option<EventRecord>, StoreError> {
        self.request(|reply| Command::ReadFirst { reply }).await
    }

    async fn read_all(&self) -> Result<Vec<EventRecord>, StoreError> {
        self.request(|reply| Command::ReadAll { reply }).await
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        self.request(|reply| Command::Clear { reply }).await
    }

    async fn take_all(&self) -> Result<Vec<EventRecord>, StoreError> {
        self.request(|reply| Command::TakeAll { reply }).await
    }
}
