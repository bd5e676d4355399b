//! Service Layer
//!
//! Lifecycle surface exposed to the host application:
//! - **Provider**: the stream of `(reading, context)` batches feeding ingestion
//! - **State**: the persisted `is_started` flag
//! - **Service**: start/stop, the ingest worker and the transmission interval
//!
//! # Components
//!
//! - [`LocationService`] / [`LocationServiceBuilder`]: Service and its construction
//! - [`LocationProvider`] / [`ChannelLocationProvider`]: Reading source seam
//! - [`DeviceSnapshot`] / [`StaticDeviceSnapshot`]: Network/device metadata seam
//! - [`LifecycleState`]: Persisted lifecycle flag

mod error;
mod location_service;
mod provider;
mod state;

pub use error::{ServiceError, StateError};
pub use location_service::{LocationService, LocationServiceBuilder, ServiceStats};
pub use provider::{
    ChannelLocationProvider, DeviceSnapshot, LocationProvider, ReadingBatch, ReadingSender,
    StaticDeviceSnapshot, parse_reading_batch,
};
pub use state::LifecycleState;
