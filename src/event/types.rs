//! Core data types for captured events.
//!
//! - [`LocationReading`]: Raw fix delivered by the location provider
//! - [`LocationContext`]: Why the provider produced the fix
//! - [`AdvertisingInfo`] / [`NetworkInfo`] / [`DeviceInfo`]: Metadata attached at capture
//! - [`LocationEvent`]: The enriched event that gets buffered and delivered

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// A raw location fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReading {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters.
    #[serde(default)]
    pub altitude: f64,
    /// Horizontal accuracy radius in meters.
    #[serde(default)]
    pub horizontal_accuracy: f64,
    /// Vertical accuracy in meters.
    #[serde(default)]
    pub vertical_accuracy: f64,
    /// Bearing in degrees, if known.
    #[serde(default)]
    pub course: Option<f64>,
    /// Speed in meters per second, if known.
    #[serde(default)]
    pub speed: Option<f64>,
    /// When the fix was taken (UTC).
    pub timestamp: DateTime<Utc>,
}

impl LocationReading {
    /// Create a reading with zeroed accuracy fields.
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            altitude: 0.0,
            horizontal_accuracy: 0.0,
            vertical_accuracy: 0.0,
            course: None,
            speed: None,
            timestamp,
        }
    }

    /// Set course and speed.
    pub fn with_motion(mut self, course: f64, speed: f64) -> Self {
        self.course = Some(course);
        self.speed = Some(speed);
        self
    }

    /// Set altitude and accuracy radii.
    pub fn with_accuracy(mut self, altitude: f64, horizontal: f64, vertical: f64) -> Self {
        self.altitude = altitude;
        self.horizontal_accuracy = horizontal;
        self.vertical_accuracy = vertical;
        self
    }
}

/// Causal context of a reading, opaque to the buffer.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LocationContext {
    /// Ordinary periodic update.
    #[default]
    Regular,
    /// Arrival at a visited place.
    VisitEntry,
    /// Departure from a visited place.
    VisitExit,
    /// Fix taken while the host was woken for a background fetch.
    BackgroundFetch,
    /// Provider gave no context.
    Unknown,
}

/// Advertising identity attached to every event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisingInfo {
    /// Advertising identifier, if the host exposes one.
    #[serde(default)]
    pub advertising_id: Option<String>,
    /// Whether the user limited ad tracking.
    #[serde(default)]
    pub is_limited_ad_tracking_enabled: bool,
}

/// Wi-Fi network seen at capture time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    #[serde(default)]
    pub bssid: Option<String>,
    #[serde(default)]
    pub ssid: Option<String>,
}

/// Device state at capture time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub is_charging: Option<bool>,
    #[serde(default)]
    pub device_model: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
}

/// An enriched location event, the unit that is buffered and delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEvent {
    /// Capture time; drives the flush age check.
    pub timestamp: DateTime<Utc>,
    pub location: LocationReading,
    pub advertising: AdvertisingInfo,
    pub network: NetworkInfo,
    pub device: DeviceInfo,
    pub context: LocationContext,
}
