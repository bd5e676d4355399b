//! Event store trait.

use async_trait::async_trait;

use crate::storage::{EventRecord, StoreError};

/// Value reported by [`EventStore::count_or_sentinel`] when counting fails.
pub const COUNT_SENTINEL: i64 = -1;

/// An ordered, durable collection of opaque event payloads.
///
/// Records leave the store only through [`clear`](EventStore::clear) or
/// [`take_all`](EventStore::take_all); there is no per-row delete. Implementations never retry internally.
///
/// # Ordering
///
/// `read_all` reflects every insert that returned `Ok` before the call was
/// issued. Inserts racing with an in-flight read may or may not be included.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Append one record. Returns once the write is durable.
    async fn insert(&self, payload: Vec<u8>) -> Result<(), StoreError>;

    /// Append records as one unit.
    ///
    /// For two or more payloads every row commits or none does.
    async fn insert_all(&self, payloads: Vec<Vec<u8>>) -> Result<(), StoreError>;

    /// Number of buffered records.
    async fn count(&self) -> Result<i64, StoreError>;

    /// The record with the smallest sequence id.
    async fn read_first(&self) -> Result<Option<EventRecord>, StoreError>;

    /// Every record, ascending by sequence id.
    async fn read_all(&self) -> Result<Vec<EventRecord>, StoreError>;

    /// Delete every record. Returns the number removed.
    async fn clear(&self) -> Result<u64, StoreError>;

    /// Remove and return every record, ascending by sequence id.
    ///
    /// The read and the delete are one step: a record inserted concurrently
    /// is either returned or left in the store, never deleted unread.
    async fn take_all(&self) -> Result<Vec<EventRecord>, StoreError>;

    /// Diagnostic count: degrades to [`COUNT_SENTINEL`] instead of failing.
    async fn count_or_sentinel(&self) -> i64 {
        match self.count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Failed to count buffered events");
                COUNT_SENTINEL
            }
        }
    }
}
