//! Configuration module for the locus service.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Collector endpoint (URL, headers, transmission interval, timeouts)
//! - Database settings (path, channel capacity)
//! - Collected fields and advertising identity
//! - Lifecycle state file location

mod app;
mod validation;

pub use app::{AppConfig, CollectorEndpointConfig, DatabaseConfig};
pub use validation::{ConfigError, expand_env_vars, parse_duration};

// Re-export constants
pub use app::{DEFAULT_DB_PATH, DEFAULT_STATE_PATH};
