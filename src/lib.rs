//! Locus - Durable Location Telemetry Buffer
//!
//! This crate buffers location events on the device and delivers them to a
//! remote collector without losing any between capture and a successful
//! send. It can be embedded as a library, or run as a standalone binary with
//! the `locus` executable, which reads readings as JSON lines on stdin.
//!
//! # Architecture
//!
//! - **Event**: readings, capture-time metadata and the payload codec
//! - **Storage**: SQLite-backed ordered buffer with atomic batch inserts
//! - **Delivery**: age-based flush policy and the drain/post/re-buffer cycle
//! - **Service**: start/stop lifecycle and the ingest worker
//! - **Config**: YAML configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use locus::{
//!     ChannelLocationProvider, DeliveryCoordinator, Endpoint, HttpPoster, LocationService,
//!     StorageBuilder,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handles = StorageBuilder::new("./locus.sqlite3").build().await?;
//!     let poster = HttpPoster::new(locus::DEFAULT_REQUEST_TIMEOUT)?;
//!     let coordinator = DeliveryCoordinator::new(
//!         Arc::new(handles.store.clone()),
//!         Arc::new(poster),
//!         Endpoint::new("https://collector.example.com/locations"),
//!     );
//!     let (provider, readings) = ChannelLocationProvider::new(64);
//!
//!     let mut service =
//!         LocationService::builder(coordinator, Arc::new(provider), "./locus.state.json").build();
//!     service.start()?;
//!     // ... push batches through `readings` ...
//!     service.stop().await?;
//!     handles.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod delivery;
pub mod event;
pub mod service;
pub mod storage;

pub use delivery::{
    BackgroundTasks, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TRANSMISSION_INTERVAL, DeliveryCoordinator,
    DeliveryOutcome, Endpoint, FlushPolicy, HttpPoster, PostRequest, Poster, TransportError,
};
pub use event::{
    CodecError, CollectingFieldsConfig, LocationContext, LocationEvent, LocationReading,
};
pub use service::{
    ChannelLocationProvider, LocationProvider, LocationService, ReadingSender, ServiceError,
};
pub use storage::{
    EventRecord, EventStore, MemoryEventStore, SqliteEventStore, StorageBuilder, StorageHandles,
    StoreError,
};
