//! Application configuration structures.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::delivery::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_TRANSMISSION_INTERVAL};
use crate::event::{AdvertisingInfo, CollectingFieldsConfig};
use crate::storage::DEFAULT_CHANNEL_CAPACITY;

use super::validation::{ConfigError, expand_headers, validate_collector_url, validate_non_zero};

// =============================================================================
// Constants
// =============================================================================

/// Default database file.
pub const DEFAULT_DB_PATH: &str = "locus.sqlite3";

/// Default lifecycle state file.
pub const DEFAULT_STATE_PATH: &str = "locus.state.json";

fn default_transmission_interval() -> Duration {
    DEFAULT_TRANSMISSION_INTERVAL
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}

// =============================================================================
// Collector Endpoint Configuration
// =============================================================================

/// Where and how often buffered events are posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorEndpointConfig {
    /// Collector URL (http or https).
    pub url: String,

    /// Extra request headers; values support `${VAR}` and `${VAR:-default}`.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Flush once the oldest buffered event is older than this (default: 5m).
    #[serde(
        default = "default_transmission_interval",
        with = "humantime_serde"
    )]
    pub transmission_interval: Duration,

    /// Per-request timeout (default: 30s).
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Also check the flush policy on this period, not only after ingest.
    #[serde(default, with = "humantime_serde")]
    pub flush_check_interval: Option<Duration>,
}

impl CollectorEndpointConfig {
    /// Endpoint config with defaults for everything but the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            transmission_interval: DEFAULT_TRANSMISSION_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            flush_check_interval: None,
        }
    }

    /// Headers with environment references expanded.
    pub fn resolved_headers(&self) -> BTreeMap<String, String> {
        expand_headers(&self.headers)
    }
}

// =============================================================================
// Database Configuration
// =============================================================================

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path (default: "locus.sqlite3").
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Store command channel capacity (default: 1024).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Collector endpoint configuration.
    pub collector: CollectorEndpointConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Optional fields attached to events.
    #[serde(default)]
    pub collecting_fields: CollectingFieldsConfig,

    /// Advertising identity attached to events.
    #[serde(default)]
    pub advertising: AdvertisingInfo,

    /// Lifecycle state file (default: "locus.state.json").
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

impl AppConfig {
    /// Configuration with defaults for everything but the collector URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            collector: CollectorEndpointConfig::new(url),
            database: DatabaseConfig::default(),
            collecting_fields: CollectingFieldsConfig::default(),
            advertising: AdvertisingInfo::default(),
            state_path: default_state_path(),
        }
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_collector_url(&self.collector.url)?;
        validate_non_zero(
            "collector transmission_interval",
            self.collector.transmission_interval,
        )?;
        validate_non_zero("collector request_timeout", self.collector.request_timeout)?;

        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "database path cannot be empty".to_string(),
            ));
        }
        if self.database.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "database channel_capacity must be positive".to_string(),
            ));
        }
        if self.state_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "state_path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
