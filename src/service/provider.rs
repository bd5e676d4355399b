//! Reading sources and host metadata snapshots.

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendError;

use crate::event::{DeviceInfo, LocationContext, LocationReading, NetworkInfo};

/// One delivery from the provider: readings with their causal context.
pub type ReadingBatch = Vec<(LocationReading, LocationContext)>;

#[derive(Deserialize)]
struct ReadingLine {
    #[serde(flatten)]
    reading: LocationReading,
    #[serde(default)]
    context: LocationContext,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReadingLines {
    One(ReadingLine),
    Many(Vec<ReadingLine>),
}

/// Parse one line of newline-delimited JSON into a reading batch.
///
/// A line holds either one reading object or an array of them. Each object
/// carries the reading fields plus an optional `context`.
pub fn parse_reading_batch(line: &str) -> Result<ReadingBatch, serde_json::Error> {
    let lines = match serde_json::from_str(line)? {
        ReadingLines::One(one) => vec![one],
        ReadingLines::Many(many) => many,
    };
    Ok(lines
        .into_iter()
        .map(|line| (line.reading, line.context))
        .collect())
}

/// Source of location readings.
///
/// The stream is lazy and unbounded. A subscription ends when the provider
/// is cancelled; the receiver then yields whatever is queued and closes.
pub trait LocationProvider: Send + Sync + 'static {
    /// Begin delivering readings to a fresh receiver.
    fn subscribe(&self) -> mpsc::Receiver<ReadingBatch>;

    /// Stop delivering readings to the current subscriber.
    fn cancel(&self);
}

/// Network and device metadata at capture time.
pub trait DeviceSnapshot: Send + Sync + 'static {
    fn network(&self) -> NetworkInfo;
    fn device(&self) -> DeviceInfo;
}

/// [`DeviceSnapshot`] with fixed values.
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceSnapshot {
    pub network: NetworkInfo,
    pub device: DeviceInfo,
}

impl DeviceSnapshot for StaticDeviceSnapshot {
    fn network(&self) -> NetworkInfo {
        self.network.clone()
    }

    fn device(&self) -> DeviceInfo {
        self.device.clone()
    }
}

type Subscriber = Arc<Mutex<Option<mpsc::Sender<ReadingBatch>>>>;

/// [`LocationProvider`] fed through a [`ReadingSender`].
///
/// Readings pushed while nobody is subscribed are handed back to the caller.
#[derive(Debug)]
pub struct ChannelLocationProvider {
    subscriber: Subscriber,
    capacity: usize,
}

/// Pushes reading batches into a [`ChannelLocationProvider`].
#[derive(Debug, Clone)]
pub struct ReadingSender {
    subscriber: Subscriber,
}

impl ChannelLocationProvider {
    /// Create a provider whose subscriptions buffer up to `capacity` batches.
    pub fn new(capacity: usize) -> (Self, ReadingSender) {
        let subscriber: Subscriber = Arc::default();
        let provider = Self {
            subscriber: Arc::clone(&subscriber),
            capacity: capacity.max(1),
        };
        (provider, ReadingSender { subscriber })
    }
}

impl LocationProvider for ChannelLocationProvider {
    fn subscribe(&self) -> mpsc::Receiver<ReadingBatch> {
        let (tx, rx) = mpsc::channel(self.capacity);
        if let Ok(mut slot) = self.subscriber.lock() {
            *slot = Some(tx);
        }
        rx
    }

    fn cancel(&self) {
        if let Ok(mut slot) = self.subscriber.lock() {
            slot.take();
        }
    }
}

impl ReadingSender {
    /// Deliver a batch to the current subscriber.
    ///
    /// Waits while the subscriber's queue is full. Fails, returning the
    /// batch, when nobody is subscribed.
    pub async fn send(&self, batch: ReadingBatch) -> Result<(), SendError<ReadingBatch>> {
        let tx = match self.subscriber.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        match tx {
            Some(tx) => tx.send(batch).await,
            None => Err(SendError(batch)),
        }
    }

    /// Whether a subscriber is attached.
    pub fn is_subscribed(&self) -> bool {
        self.subscriber
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }
}
