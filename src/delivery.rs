//! Delivery Layer
//!
//! Moves buffered events to the remote collector:
//! - **Policy**: decides when the buffer is due, from the oldest event's age
//! - **Coordinator**: drain → clear → post, re-buffering on failure
//! - **Transport**: one POST per batch
//!
//! # Components
//!
//! - [`FlushPolicy`]: Age-based flush trigger
//! - [`DeliveryCoordinator`]: Drain/deliver cycle with at-least-once semantics
//! - [`Poster`] / [`HttpPoster`]: Transport seam and its HTTP implementation
//! - [`BackgroundTasks`] / [`BackgroundTaskGuard`]: Host background allowance hook

mod background;
mod coordinator;
mod policy;
mod transport;

pub use background::{BackgroundTaskGuard, BackgroundTaskId, BackgroundTasks, NoopBackgroundTasks};
pub use coordinator::{
    DeliveryCoordinator, DeliveryOutcome, DeliveryStats, DeliveryStatsSnapshot, Endpoint,
    PendingBatch,
};
pub use policy::{DEFAULT_TRANSMISSION_INTERVAL, FlushPolicy};
pub use transport::{
    DEFAULT_REQUEST_TIMEOUT, HttpPoster, LOCATIONS_KEY, PostRequest, Poster, TransportError,
};
