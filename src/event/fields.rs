//! Field collection settings and event assembly.

use serde::{Deserialize, Serialize};

use crate::event::{
    AdvertisingInfo, DeviceInfo, LocationContext, LocationEvent, LocationReading, NetworkInfo,
};

fn default_true() -> bool {
    true
}

/// Which optional fields are attached to captured events.
///
/// Every field defaults to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectingFieldsConfig {
    /// Attach Wi-Fi BSSID/SSID.
    #[serde(default = "default_true")]
    pub network_info: bool,
    /// Attach course (bearing).
    #[serde(default = "default_true")]
    pub device_course: bool,
    /// Attach speed.
    #[serde(default = "default_true")]
    pub device_speed: bool,
    /// Attach charging state.
    #[serde(default = "default_true")]
    pub device_charging: bool,
    /// Attach hardware model.
    #[serde(default = "default_true")]
    pub device_model: bool,
    /// Attach OS version.
    #[serde(default = "default_true")]
    pub device_os_version: bool,
}

impl Default for CollectingFieldsConfig {
    fn default() -> Self {
        Self {
            network_info: true,
            device_course: true,
            device_speed: true,
            device_charging: true,
            device_model: true,
            device_os_version: true,
        }
    }
}

impl CollectingFieldsConfig {
    /// Configuration that collects no optional field.
    pub fn none() -> Self {
        Self {
            network_info: false,
            device_course: false,
            device_speed: false,
            device_charging: false,
            device_model: false,
            device_os_version: false,
        }
    }
}

/// Builds [`LocationEvent`]s from readings, filtering fields per configuration.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    fields: CollectingFieldsConfig,
    advertising: AdvertisingInfo,
    network: NetworkInfo,
    device: DeviceInfo,
}

impl EventBuilder {
    /// Create a builder with the given field settings and advertising identity.
    pub fn new(fields: CollectingFieldsConfig, advertising: AdvertisingInfo) -> Self {
        Self {
            fields,
            advertising,
            network: NetworkInfo::default(),
            device: DeviceInfo::default(),
        }
    }

    /// Set the network snapshot used for subsequent events.
    pub fn with_network(mut self, network: NetworkInfo) -> Self {
        self.network = network;
        self
    }

    /// Set the device snapshot used for subsequent events.
    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    /// Assemble one event.
    pub fn build(&self, reading: &LocationReading, context: LocationContext) -> LocationEvent {
        let fields = &self.fields;

        let mut location = reading.clone();
        if !fields.device_course {
            location.course = None;
        }
        if !fields.device_speed {
            location.speed = None;
        }

        let network = if fields.network_info {
            self.network.clone()
        } else {
            NetworkInfo::default()
        };

        let device = DeviceInfo {
            is_charging: self.device.is_charging.filter(|_| fields.device_charging),
            device_model: self
                .device
                .device_model
                .clone()
                .filter(|_| fields.device_model),
            os_version: self
                .device
                .os_version
                .clone()
                .filter(|_| fields.device_os_version),
        };

        LocationEvent {
            timestamp: reading.timestamp,
            location,
            advertising: self.advertising.clone(),
            network,
            device,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading() -> LocationReading {
        LocationReading::new(40.7, -74.0, Utc.timestamp_opt(1234, 0).unwrap())
            .with_motion(180.0, 20.0)
    }

    fn builder(fields: CollectingFieldsConfig) -> EventBuilder {
        EventBuilder::new(
            fields,
            AdvertisingInfo {
                advertising_id: Some("123".to_string()),
                is_limited_ad_tracking_enabled: false,
            },
        )
        .with_network(NetworkInfo {
            bssid: Some("bssid_goes_here".to_string()),
            ssid: Some("ssid_goes_here".to_string()),
        })
        .with_device(DeviceInfo {
            is_charging: Some(false),
            device_model: Some("iPhone9,4".to_string()),
            os_version: Some("iOS 11.0.1".to_string()),
        })
    }

    #[test]
    fn test_default_collects_everything() {
        let event = builder(CollectingFieldsConfig::default())
            .build(&reading(), LocationContext::VisitEntry);

        assert_eq!(event.timestamp, reading().timestamp);
        assert_eq!(event.location.course, Some(180.0));
        assert_eq!(event.location.speed, Some(20.0));
        assert_eq!(event.network.ssid.as_deref(), Some("ssid_goes_here"));
        assert_eq!(event.device.device_model.as_deref(), Some("iPhone9,4"));
        assert_eq!(event.device.is_charging, Some(false));
        assert_eq!(event.context, LocationContext::VisitEntry);
    }

    #[test]
    fn test_disabled_fields_are_dropped() {
        let event = builder(CollectingFieldsConfig::none()).build(&reading(), LocationContext::Regular);

        assert!(event.location.course.is_none());
        assert!(event.location.speed.is_none());
        assert_eq!(event.network, NetworkInfo::default());
        assert_eq!(event.device, DeviceInfo::default());
        // Coordinates and identity are never filtered.
        assert_eq!(event.location.latitude, 40.7);
        assert_eq!(event.advertising.advertising_id.as_deref(), Some("123"));
    }

    #[test]
    fn test_fields_config_yaml_defaults() {
        let fields: CollectingFieldsConfig =
            serde_yaml::from_str("device_speed: false\n").unwrap();
        assert!(!fields.device_speed);
        assert!(fields.network_info);
        assert!(fields.device_os_version);
    }
}
