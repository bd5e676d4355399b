//! Storage Layer
//!
//! Durable, ordered buffer of opaque event payloads over a single SQLite
//! connection:
//! - **Actor**: one task owns the connection and serializes every statement
//! - **Facade**: cloneable handle that turns calls into actor commands
//!
//! # Components
//!
//! - [`EventStore`]: Store contract shared by every backend
//! - [`SqliteEventStore`]: Durable store facade
//! - [`MemoryEventStore`]: Non-durable store with the same contract
//! - [`StorageBuilder`] / [`StorageHandles`]: Initialization and lifecycle management

mod actor;
mod builder;
pub mod db;
mod error;
mod facades;
mod memory;
pub mod schema;
mod traits;
mod types;

pub use builder::{DEFAULT_CHANNEL_CAPACITY, StorageBuilder, StorageHandles};
pub use error::StoreError;
pub use facades::SqliteEventStore;
pub use memory::MemoryEventStore;
pub use traits::{COUNT_SENTINEL, EventStore};
pub use types::EventRecord;
