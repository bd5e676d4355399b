//! In-memory event store.
//!
//! Same contract as the SQLite store minus durability: records vanish with
//! the process. Useful where no writable disk is available, and in tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::storage::types::check_payload;
use crate::storage::{EventRecord, EventStore, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    records: Vec<EventRecord>,
}

impl MemoryState {
    fn push(&mut self, payload: Vec<u8>) {
        self.next_id += 1;
        self.records.push(EventRecord::new(self.next_id, payload));
    }
}

/// Non-durable [`EventStore`] backed by a vector.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    state: Mutex<MemoryState>,
}

impl MemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert(&self, payload: Vec<u8>) -> Result<(), StoreError> {
        check_payload(&payload)?;
        self.state.lock().await.push(payload);
        Ok(())
    }

    async fn insert_all(&self, payloads: Vec<Vec<u8>>) -> Result<(), StoreError> {
        // Validate up front so a bad row leaves nothing behind.
        for payload in &payloads {
            check_payload(payload)?;
        }

        let mut state = self.state.lock().await;
        for payload in payloads {
            state.push(payload);
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.state.lock().await.records.len() as i64)
    }

    async fn read_first(&self) -> Result<Option<EventRecord>, StoreError> {
        Ok(self.state.lock().await.records.first().cloned())
    }

    async fn read_all(&self) -> Result<Vec<EventRecord>, StoreError> {
        Ok(self.state.lock().await.records.clone())
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let removed = state.records.len() as u64;
        state.records.clear();
        Ok(removed)
    }

    async fn take_all(&self) -> Result<Vec<EventRecord>, StoreError> {
        Ok(std::mem::take(&mut self.state.lock().await.records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_contract() {
        let store = MemoryEventStore::new();
        assert!(store.read_first().await.unwrap().is_none());

        store.insert(b"a".to_vec()).await.unwrap();
        store
            .insert_all(vec![b"b".to_vec(), b"c".to_vec()])
            .await
            .unwrap();

        let all = store.read_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(store.read_first().await.unwrap().unwrap().payload, b"a");
        assert!(all.windows(2).all(|w| w[0].sequence_id < w[1].sequence_id));

        assert_eq!(store.clear().await.unwrap(), 3);
        assert!(store.take_all().await.unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 0);

        // Ids keep increasing after a clear.
        store.insert(b"d".to_vec()).await.unwrap();
        assert_eq!(store.read_first().await.unwrap().unwrap().sequence_id, 4);
    }

    #[tokio::test]
    async fn test_memory_insert_all_is_atomic() {
        let store = MemoryEventStore::new();
        let result = store
            .insert_all(vec![b"ok".to_vec(), Vec::new(), b"ok".to_vec()])
            .await;
        assert!(matches!(result, Err(StoreError::BindMismatch(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
