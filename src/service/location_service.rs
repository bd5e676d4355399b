//! Location service lifecycle.
//!
//! `start` subscribes to the provider and spawns the ingest worker. The
//! worker handles one reading batch at a time: build events, encode, append
//! them with one `insert_all`, then check the flush policy. A due buffer is
//! drained on the worker and the batch is delivered on a separate task, so
//! ingestion never waits on the network.
//!
//! `stop` cancels the provider, lets the worker finish queued batches and
//! in-flight deliveries, then flushes whatever remains regardless of age.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Interval, MissedTickBehavior};

use crate::delivery::{DeliveryCoordinator, DeliveryOutcome, DeliveryStatsSnapshot, FlushPolicy};
use crate::event::{AdvertisingInfo, CollectingFieldsConfig, EventBuilder, encode};
use crate::service::{
    DeviceSnapshot, LifecycleState, LocationProvider, ReadingBatch, ServiceError,
    StaticDeviceSnapshot,
};

/// Point-in-time view of the service counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStats {
    /// Rows currently buffered, or the count sentinel if the store failed.
    pub buffered: i64,
    /// Events appended to the store by the ingest worker.
    pub ingested: u64,
    /// Events lost before reaching the store (encode or insert failure).
    pub rejected: u64,
    pub delivery: DeliveryStatsSnapshot,
}

#[derive(Debug, Default)]
struct IngestCounters {
    ingested: AtomicU64,
    rejected: AtomicU64,
}

/// Builder for [`LocationService`].
pub struct LocationServiceBuilder {
    coordinator: DeliveryCoordinator,
    provider: Arc<dyn LocationProvider>,
    state_path: PathBuf,
    fields: CollectingFieldsConfig,
    advertising: AdvertisingInfo,
    snapshot: Arc<dyn DeviceSnapshot>,
    policy: FlushPolicy,
    flush_check_interval: Option<Duration>,
}

impl LocationServiceBuilder {
    /// Which optional fields are attached to events.
    pub fn collecting_fields(mut self, fields: CollectingFieldsConfig) -> Self {
        self.fields = fields;
        self
    }

    /// Advertising identity attached to every event.
    pub fn advertising(mut self, advertising: AdvertisingInfo) -> Self {
        self.advertising = advertising;
        self
    }

    /// Source of network and device metadata.
    pub fn device_snapshot(mut self, snapshot: Arc<dyn DeviceSnapshot>) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Initial transmission interval.
    pub fn transmission_interval(mut self, interval: Duration) -> Self {
        self.policy = FlushPolicy::new(interval);
        self
    }

    /// Also evaluate the flush policy on a timer, not only after ingest.
    pub fn flush_check_interval(mut self, interval: Option<Duration>) -> Self {
        self.flush_check_interval = interval.filter(|d| !d.is_zero());
        self
    }

    /// Load the persisted lifecycle state and build the service.
    ///
    /// A malformed state file is logged and treated as "not started".
    pub fn build(self) -> LocationService {
        let state = LifecycleState::load(&self.state_path).unwrap_or_else(|e| {
            tracing::warn!(
                error = %e,
                path = %self.state_path.display(),
                "Ignoring unreadable lifecycle state"
            );
            LifecycleState::default()
        });
        let (policy_tx, _) = watch::channel(self.policy);

        LocationService {
            coordinator: self.coordinator,
            provider: self.provider,
            state_path: self.state_path,
            state,
            fields: self.fields,
            advertising: self.advertising,
            snapshot: self.snapshot,
            policy_tx,
            flush_check_interval: self.flush_check_interval,
            counters: Arc::new(IngestCounters::default()),
            worker: None,
        }
    }
}

struct RunningWorker {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

/// Host-facing lifecycle of the location buffer.
pub struct LocationService {
    coordinator: DeliveryCoordinator,
    provider: Arc<dyn LocationProvider>,
    state_path: PathBuf,
    state: LifecycleState,
    fields: CollectingFieldsConfig,
    advertising: AdvertisingInfo,
    snapshot: Arc<dyn DeviceSnapshot>,
    policy_tx: watch::Sender<FlushPolicy>,
    flush_check_interval: Option<Duration>,
    counters: Arc<IngestCounters>,
    worker: Option<RunningWorker>,
}

impl std::fmt::Debug for LocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationService")
            .field("state", &self.state)
            .field("running", &self.worker.is_some())
            .field("transmission_interval", &self.transmission_interval())
            .finish_non_exhaustive()
    }
}

impl LocationService {
    /// Start building a service around a coordinator and a reading source.
    pub fn builder(
        coordinator: DeliveryCoordinator,
        provider: Arc<dyn LocationProvider>,
        state_path: impl AsRef<Path>,
    ) -> LocationServiceBuilder {
        LocationServiceBuilder {
            coordinator,
            provider,
            state_path: state_path.as_ref().to_path_buf(),
            fields: CollectingFieldsConfig::default(),
            advertising: AdvertisingInfo::default(),
            snapshot: Arc::new(StaticDeviceSnapshot::default()),
            policy: FlushPolicy::default(),
            flush_check_interval: None,
        }
    }

    /// Subscribe to the provider and spawn the ingest worker.
    pub fn start(&mut self) -> Result<(), ServiceError> {
        if self.worker.is_some() {
            return Err(ServiceError::AlreadyStarted);
        }

        self.persist(true)?;

        let readings = self.provider.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = IngestWorker {
            coordinator: self.coordinator.clone(),
            fields: self.fields,
            advertising: self.advertising.clone(),
            snapshot: Arc::clone(&self.snapshot),
            policy_rx: self.policy_tx.subscribe(),
            counters: Arc::clone(&self.counters),
            deliveries: JoinSet::new(),
        };
        let ticker = self.flush_check_interval.map(|period| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let handle = tokio::spawn(worker.run(readings, shutdown_rx, ticker));

        self.worker = Some(RunningWorker {
            handle,
            shutdown: shutdown_tx,
        });

        tracing::info!(
            transmission_interval = ?self.transmission_interval(),
            flush_check_interval = ?self.flush_check_interval,
            "Location service started"
        );
        Ok(())
    }

    /// Stop ingestion and flush everything still buffered.
    ///
    /// Safe to call when not started; with an empty store no request is made.
    pub async fn stop(&mut self) -> Result<DeliveryOutcome, ServiceError> {
        self.provider.cancel();

        if let Some(worker) = self.worker.take() {
            // Cancelling the provider closes the reading stream; the signal
            // covers providers whose receivers stay open.
            let _ = worker.shutdown.send(());
            if let Err(e) = worker.handle.await {
                tracing::error!(error = %e, "Ingest worker panicked");
            }
        }

        let outcome = self.coordinator.flush().await;
        self.persist(false)?;

        let outcome = outcome?;
        tracing::info!(?outcome, "Location service stopped");
        Ok(outcome)
    }

    /// Whether the host last started the service, across restarts.
    pub fn is_started(&self) -> bool {
        self.state.is_started
    }

    /// Whether the ingest worker is running in this process.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Current transmission interval.
    pub fn transmission_interval(&self) -> Duration {
        self.policy_tx.borrow().transmission_interval()
    }

    /// Change the transmission interval; applies from the next policy check.
    pub fn set_transmission_interval(&self, interval: Duration) {
        self.policy_tx.send_replace(FlushPolicy::new(interval));
        tracing::debug!(transmission_interval = ?interval, "Transmission interval updated");
    }

    /// The delivery coordinator driving this service.
    pub fn coordinator(&self) -> &DeliveryCoordinator {
        &self.coordinator
    }

    /// Current counters.
    pub async fn stats(&self) -> ServiceStats {
        ServiceStats {
            buffered: self.coordinator.store().count_or_sentinel().await,
            ingested: self.counters.ingested.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            delivery: self.coordinator.stats(),
        }
    }

    fn persist(&mut self, is_started: bool) -> Result<(), ServiceError> {
        let state = LifecycleState { is_started };
        state.save(&self.state_path)?;
        self.state = state;
        Ok(())
    }
}

// =============================================================================
// Ingest worker
// =============================================================================

struct IngestWorker {
    coordinator: DeliveryCoordinator,
    fields: CollectingFieldsConfig,
    advertising: AdvertisingInfo,
    snapshot: Arc<dyn DeviceSnapshot>,
    policy_rx: watch::Receiver<FlushPolicy>,
    counters: Arc<IngestCounters>,
    deliveries: JoinSet<DeliveryOutcome>,
}

impl IngestWorker {
    async fn run(
        mut self,
        mut readings: mpsc::Receiver<ReadingBatch>,
        mut shutdown: oneshot::Receiver<()>,
        mut ticker: Option<Interval>,
    ) {
        tracing::debug!("Ingest worker started");

        loop {
            tokio::select! {
                biased;

                batch = readings.recv() => match batch {
                    Some(batch) => {
                        self.ingest(batch).await;
                        self.flush_if_due().await;
                    }
                    None => break,
                },
                _ = &mut shutdown => break,
                _ = tick(&mut ticker) => self.flush_if_due().await,
                Some(joined) = self.deliveries.join_next(), if !self.deliveries.is_empty() => {
                    log_delivery(joined);
                }
            }
        }

        while let Some(joined) = self.deliveries.join_next().await {
            log_delivery(joined);
        }

        tracing::debug!("Ingest worker stopped");
    }

    async fn ingest(&self, batch: ReadingBatch) {
        let builder = EventBuilder::new(self.fields, self.advertising.clone())
            .with_network(self.snapshot.network())
            .with_device(self.snapshot.device());

        let total = batch.len();
        let payloads: Vec<Vec<u8>> = batch
            .iter()
            .filter_map(|(reading, context)| {
                encode(&builder.build(reading, *context))
                    .inspect_err(|e| tracing::warn!(error = %e, "Failed to encode event"))
                    .ok()
            })
            .collect();

        let encoded = payloads.len();
        self.counters
            .rejected
            .fetch_add((total - encoded) as u64, Ordering::Relaxed);
        if encoded == 0 {
            return;
        }

        // A failed batch is rolled back in full and not retried.
        match self.coordinator.store().insert_all(payloads).await {
            Ok(()) => {
                self.counters
                    .ingested
                    .fetch_add(encoded as u64, Ordering::Relaxed);
                tracing::debug!(count = encoded, "Events buffered");
            }
            Err(e) => {
                self.counters
                    .rejected
                    .fetch_add(encoded as u64, Ordering::Relaxed);
                tracing::error!(error = %e, count = encoded, "Failed to buffer events");
            }
        }
    }

    async fn flush_if_due(&mut self) {
        let policy = *self.policy_rx.borrow_and_update();

        match self.coordinator.is_due(&policy, Utc::now()).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read oldest buffered event");
                return;
            }
        }

        match self.coordinator.drain().await {
            Ok(Some(batch)) => {
                let coordinator = self.coordinator.clone();
                self.deliveries
                    .spawn(async move { coordinator.deliver(batch).await });
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "Failed to drain event store"),
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn log_delivery(joined: Result<DeliveryOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => tracing::debug!(?outcome, "Delivery finished"),
        Err(e) => tracing::error!(error = %e, "Delivery task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{Endpoint, PostRequest, Poster, TransportError};
    use crate::event::{LocationContext, LocationReading};
    use crate::service::{ChannelLocationProvider, ReadingSender};
    use crate::storage::{EventStore, MemoryEventStore};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::{TempDir, tempdir};

    #[derive(Default)]
    struct RecordingPoster {
        requests: Mutex<Vec<PostRequest>>,
    }

    impl RecordingPoster {
        fn requests(&self) -> Vec<PostRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Poster for RecordingPoster {
        async fn post(&self, request: PostRequest) -> Result<(), TransportError> {
            self.requests.lock().unwrap().push(request);
            Ok(())
        }
    }

    struct Harness {
        _dir: TempDir,
        state_path: PathBuf,
        store: Arc<MemoryEventStore>,
        poster: Arc<RecordingPoster>,
        sender: ReadingSender,
        service: LocationService,
    }

    fn harness(interval: Duration) -> Harness {
        let dir = tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let store = Arc::new(MemoryEventStore::new());
        let poster = Arc::new(RecordingPoster::default());
        let (provider, sender) = ChannelLocationProvider::new(8);
        let coordinator = DeliveryCoordinator::new(
            store.clone(),
            poster.clone(),
            Endpoint::new("http://collector.test"),
        );
        let service = LocationService::builder(coordinator, Arc::new(provider), &state_path)
            .transmission_interval(interval)
            .build();

        Harness {
            _dir: dir,
            state_path,
            store,
            poster,
            sender,
            service,
        }
    }

    fn readings_aged(ages: &[i64]) -> ReadingBatch {
        let now = Utc::now();
        ages.iter()
            .map(|age| {
                (
                    LocationReading::new(40.5, -73.25, now - chrono::Duration::seconds(*age)),
                    LocationContext::Regular,
                )
            })
            .collect()
    }

    async fn wait_for_count(store: &MemoryEventStore, expected: i64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.count().await.unwrap() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_start_and_stop_persist_flag() {
        let mut h = harness(Duration::from_secs(60));
        assert!(!h.service.is_started());

        h.service.start().unwrap();
        assert!(h.service.is_started());
        assert!(h.service.is_running());
        assert!(LifecycleState::load(&h.state_path).unwrap().is_started);
        assert!(matches!(h.service.start(), Err(ServiceError::AlreadyStarted)));

        h.service.stop().await.unwrap();
        assert!(!h.service.is_started());
        assert!(!h.service.is_running());
        assert!(!LifecycleState::load(&h.state_path).unwrap().is_started);
    }

    #[tokio::test]
    async fn test_flag_survives_restart() {
        let mut h = harness(Duration::from_secs(60));
        h.service.start().unwrap();

        let (provider, _sender) = ChannelLocationProvider::new(1);
        let coordinator = DeliveryCoordinator::new(
            Arc::new(MemoryEventStore::new()),
            Arc::new(RecordingPoster::default()),
            Endpoint::new("http://collector.test"),
        );
        let restarted =
            LocationService::builder(coordinator, Arc::new(provider), &h.state_path).build();
        assert!(restarted.is_started());
        assert!(!restarted.is_running());

        h.service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unclean_exit_is_visible_and_events_recovered() {
        let mut h = harness(Duration::from_secs(3600));
        h.service.start().unwrap();
        h.sender.send(readings_aged(&[5, 4])).await.unwrap();
        wait_for_count(&h.store, 2).await;

        // Dropped without `stop`, the way a killed process leaves things.
        drop(h.service);

        let (provider, _sender) = ChannelLocationProvider::new(1);
        let coordinator = DeliveryCoordinator::new(
            h.store.clone(),
            h.poster.clone(),
            Endpoint::new("http://collector.test"),
        );
        let mut restarted =
            LocationService::builder(coordinator, Arc::new(provider), &h.state_path).build();
        assert!(restarted.is_started());
        assert!(!restarted.is_running());

        restarted.start().unwrap();
        let outcome = restarted.stop().await.unwrap();
        assert_eq!(
            outcome,
            DeliveryOutcome::Delivered {
                delivered: 2,
                dropped: 0
            }
        );
        assert!(!restarted.is_started());
        assert_eq!(h.poster.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_with_empty_store_makes_no_request() {
        let mut h = harness(Duration::from_secs(60));
        h.service.start().unwrap();

        let outcome = h.service.stop().await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Empty);
        assert!(h.poster.requests().is_empty());
        assert_eq!(h.store.count().await.unwrap(), 0);

        // Stopping again is harmless.
        assert_eq!(h.service.stop().await.unwrap(), DeliveryOutcome::Empty);
    }

    #[tokio::test]
    async fn test_due_batch_is_delivered_on_ingest() {
        let mut h = harness(Duration::from_secs(60));
        h.service.start().unwrap();

        h.sender
            .send(readings_aged(&[61, 59, 58, 57]))
            .await
            .unwrap();

        h.service.stop().await.unwrap();

        let requests = h.poster.requests();
        assert_eq!(requests.len(), 1);
        let stamps: Vec<_> = requests[0]
            .events()
            .iter()
            .map(|e| e["utc_timestamp"].as_i64().unwrap())
            .collect();
        assert_eq!(stamps.len(), 4);
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(h.store.count().await.unwrap(), 0);

        let stats = h.service.stats().await;
        assert_eq!(stats.ingested, 4);
        assert_eq!(stats.delivery.delivered, 4);
        assert_eq!(stats.buffered, 0);
    }

    #[tokio::test]
    async fn test_fresh_events_wait_for_stop() {
        let mut h = harness(Duration::from_secs(60));
        h.service.start().unwrap();

        h.sender.send(readings_aged(&[30, 20])).await.unwrap();
        wait_for_count(&h.store, 2).await;
        assert!(h.poster.requests().is_empty());

        let outcome = h.service.stop().await.unwrap();
        assert_eq!(
            outcome,
            DeliveryOutcome::Delivered {
                delivered: 2,
                dropped: 0
            }
        );
        assert_eq!(h.poster.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_shorter_interval_applies_to_next_batch() {
        let mut h = harness(Duration::from_secs(60));
        h.service.start().unwrap();

        h.sender.send(readings_aged(&[30])).await.unwrap();
        wait_for_count(&h.store, 1).await;

        h.service.set_transmission_interval(Duration::from_secs(10));
        assert_eq!(h.service.transmission_interval(), Duration::from_secs(10));

        h.sender.send(readings_aged(&[5])).await.unwrap();
        wait_for_count(&h.store, 0).await;

        h.service.stop().await.unwrap();
        let requests = h.poster.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].events().len(), 2);
    }
}
