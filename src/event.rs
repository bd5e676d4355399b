//! Event Layer
//!
//! Everything about a single captured event: the raw reading, the metadata
//! attached at capture, and the codec that turns an event into the opaque
//! payload the store buffers.
//!
//! # Components
//!
//! - [`LocationEvent`]: Enriched event
//! - [`EventBuilder`] / [`CollectingFieldsConfig`]: Capture-time assembly and field filtering
//! - [`encode`] / [`decode`]: Payload codec
//! - [`LocationEvent::to_wire_json`]: Collector wire representation

mod codec;
mod fields;
mod types;

pub use codec::{CodecError, decode, encode};
pub use fields::{CollectingFieldsConfig, EventBuilder};
pub use types::{
    AdvertisingInfo, DeviceInfo, LocationContext, LocationEvent, LocationReading, NetworkInfo,
};
