//! Database handle management.
//!
//! The store runs over exactly one SQLite connection. The handle is not safe
//! for concurrent use, so it is opened here and then moved into the store
//! actor, which becomes its only user.

mod sqlite;

pub use sqlite::{connect_options, open_connection};
