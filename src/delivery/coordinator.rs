//! Delivery coordinator.
//!
//! Owns the drain → send → ack/retry cycle:
//!
//! 1. `take_all` the store; nothing buffered means nothing to do
//! 2. the records now live only in the [`PendingBatch`]
//! 3. decode each payload into its wire object, dropping malformed ones
//! 4. post one request while holding a background allowance
//! 5. success: the batch is gone for good
//! 6. failure: `insert_all` the original payload bytes back into the store
//!
//! Delivery is at-least-once. A retried batch carries no dedup key, and it
//! may land behind records inserted while the request was in flight.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::delivery::background::{BackgroundTaskGuard, BackgroundTasks, NoopBackgroundTasks};
use crate::delivery::policy::FlushPolicy;
use crate::delivery::transport::{PostRequest, Poster};
use crate::event::decode;
use crate::storage::{EventRecord, EventStore, StoreError};

/// Name under which delivery attempts request background time.
const BACKGROUND_TASK_NAME: &str = "locus.deliver";

/// Collector endpoint a batch is posted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

impl Endpoint {
    /// Endpoint without extra headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Set request headers.
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// Records drained from the store for one delivery attempt.
///
/// Exists only in memory; if the attempt fails its records go back to the
/// store as new rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBatch {
    records: Vec<EventRecord>,
}

impl PendingBatch {
    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in drain order.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }
}

/// Result of one flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The store was empty; the transport was not called.
    Empty,
    /// Every drained record was malformed; the transport was not called.
    Discarded { dropped: usize },
    /// The collector accepted the batch.
    Delivered { delivered: usize, dropped: usize },
    /// The send failed and the batch is buffered again.
    Rebuffered { rebuffered: usize, dropped: usize },
    /// The send failed and putting the batch back failed too.
    Lost { lost: usize, dropped: usize },
}

/// Running totals across every delivery attempt.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    attempts: AtomicU64,
    delivered: AtomicU64,
    rebuffered: AtomicU64,
    dropped: AtomicU64,
    lost: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStatsSnapshot {
    /// Transport calls made.
    pub attempts: u64,
    /// Events accepted by the collector.
    pub delivered: u64,
    /// Events put back after a failed send.
    pub rebuffered: u64,
    /// Malformed payloads discarded.
    pub dropped: u64,
    /// Events that could be neither sent nor re-buffered.
    pub lost: u64,
}

impl DeliveryStats {
    /// Read the counters.
    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            rebuffered: self.rebuffered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
        }
    }

    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Drains the store and hands batches to the transport.
///
/// Cheap to clone; clones share the store, transport and counters.
#[derive(Clone)]
pub struct DeliveryCoordinator {
    store: Arc<dyn EventStore>,
    poster: Arc<dyn Poster>,
    background: Arc<dyn BackgroundTasks>,
    endpoint: Endpoint,
    stats: Arc<DeliveryStats>,
}

impl std::fmt::Debug for DeliveryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryCoordinator")
            .field("endpoint", &self.endpoint)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl DeliveryCoordinator {
    /// Create a coordinator for hosts without background allowances.
    pub fn new(store: Arc<dyn EventStore>, poster: Arc<dyn Poster>, endpoint: Endpoint) -> Self {
        Self {
            store,
            poster,
            background: Arc::new(NoopBackgroundTasks::default()),
            endpoint,
            stats: Arc::new(DeliveryStats::default()),
        }
    }

    /// Use the host's background allowance hook.
    pub fn with_background_tasks(mut self, background: Arc<dyn BackgroundTasks>) -> Self {
        self.background = background;
        self
    }

    /// The store this coordinator drains.
    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Delivery counters.
    pub fn stats(&self) -> DeliveryStatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether the oldest buffered event is older than the policy allows.
    ///
    /// A malformed oldest payload counts as due, so the next drain discards it
    /// instead of letting it stall age-based flushing.
    pub async fn is_due(&self, policy: &FlushPolicy, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let Some(oldest) = self.store.read_first().await? else {
            return Ok(false);
        };

        match decode(&oldest.payload) {
            Ok(event) => Ok(policy.should_flush(FlushPolicy::age_of(event.timestamp, now))),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    sequence_id = oldest.sequence_id,
                    "Oldest buffered event is malformed"
                );
                Ok(true)
            }
        }
    }

    /// Take every buffered record out of the store.
    ///
    /// Returns `None` when the store is empty. Once this returns a batch the
    /// records exist only in memory until delivered or re-buffered. Inserts
    /// and re-buffers racing the drain stay in the store for the next one.
    pub async fn drain(&self) -> Result<Option<PendingBatch>, StoreError> {
        let records = self.store.take_all().await?;
        if records.is_empty() {
            return Ok(None);
        }

        tracing::debug!(count = records.len(), "Store drained");
        Ok(Some(PendingBatch { records }))
    }

    /// Send a drained batch, re-buffering it if the send fails.
    pub async fn deliver(&self, batch: PendingBatch) -> DeliveryOutcome {
        let total = batch.len();
        let mut events = Vec::with_capacity(total);
        let mut payloads = Vec::with_capacity(total);

        for record in batch.records {
            match decode(&record.payload) {
                Ok(event) => {
                    events.push(event.to_wire_json());
                    payloads.push(record.payload);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        sequence_id = record.sequence_id,
                        "Dropping malformed event"
                    );
                }
            }
        }

        let count = payloads.len();
        let dropped = total - count;
        DeliveryStats::add(&self.stats.dropped, dropped);

        if count == 0 {
            return DeliveryOutcome::Discarded { dropped };
        }

        let request = PostRequest::locations(
            self.endpoint.url.clone(),
            events,
            self.endpoint.headers.clone(),
        );

        // Held until this function returns, on every path.
        let _guard = BackgroundTaskGuard::acquire(Arc::clone(&self.background), BACKGROUND_TASK_NAME);
        DeliveryStats::add(&self.stats.attempts, 1);

        match self.poster.post(request).await {
            Ok(()) => {
                DeliveryStats::add(&self.stats.delivered, count);
                tracing::info!(count, dropped, "Events delivered");
                DeliveryOutcome::Delivered {
                    delivered: count,
                    dropped,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, count, "Delivery failed, re-buffering events");
                match self.store.insert_all(payloads).await {
                    Ok(()) => {
                        DeliveryStats::add(&self.stats.rebuffered, count);
                        DeliveryOutcome::Rebuffered {
                            rebuffered: count,
                            dropped,
                        }
                    }
                    Err(store_err) => {
                        DeliveryStats::add(&self.stats.lost, count);
                        tracing::error!(error = %store_err, count, "Failed to re-buffer events");
                        DeliveryOutcome::Lost {
                            lost: count,
                            dropped,
                        }
                    }
                }
            }
        }
    }

    /// Drain and deliver unconditionally.
    pub async fn flush(&self) -> Result<DeliveryOutcome, StoreError> {
        match self.drain().await? {
            Some(batch) => Ok(self.deliver(batch).await),
            None => Ok(DeliveryOutcome::Empty),
        }
    }

    /// Drain and deliver if the policy says the buffer is due.
    ///
    /// Returns `None` when the buffer is not due.
    pub async fn flush_if_due(
        &self,
        policy: &FlushPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<DeliveryOutcome>, StoreError> {
        if !self.is_due(policy, now).await? {
            return Ok(None);
        }
        self.flush().await.map(Some)
    }
}
