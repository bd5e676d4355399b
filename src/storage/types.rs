//! Core data types for the storage layer.

use serde::{Deserialize, Serialize};

/// One buffered event as stored in the `Location` table.
///
/// `sequence_id` is assigned by the store, strictly increasing and never
/// reused. It only orders scans; it carries no application identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Store-assigned monotonic id (`_id` column).
    pub sequence_id: i64,
    /// Opaque serialized event (`location` column).
    pub payload: Vec<u8>,
}

impl EventRecord {
    /// Create a record from a row.
    pub fn new(sequence_id: i64, payload: Vec<u8>) -> Self {
        Self {
            sequence_id,
            payload,
        }
    }
}

impl From<(i64, Vec<u8>)> for EventRecord {
    fn from((sequence_id, payload): (i64, Vec<u8>)) -> Self {
        Self::new(sequence_id, payload)
    }
}

/// Reject payloads the table cannot accept.
pub(crate) fn check_payload(payload: &[u8]) -> Result<(), crate::storage::StoreError> {
    if payload.is_empty() {
        return Err(crate::storage::StoreError::BindMismatch(
            "payload must be non-empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;

    #[test]
    fn test_record_from_row() {
        let record = EventRecord::from((7, vec![1, 2, 3]));
        assert_eq!(record.sequence_id, 7);
        assert_eq!(record.payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_check_payload() {
        assert!(check_payload(b"x").is_ok());
        assert!(matches!(
            check_payload(b""),
            Err(StoreError::BindMismatch(_))
        ));
    }
}
