//! Record codec.
//!
//! The store sees events only as opaque bytes produced here. Payload bytes
//! are JSON; the outbound wire object is a separate, flattened shape.

use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::event::LocationEvent;

/// Identifier type reported alongside the advertising id.
const ID_TYPE: &str = "idfa";

/// Errors raised while encoding or decoding a payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Event could not be serialized.
    #[error("failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),

    /// Payload is not a valid event. Retrying can never succeed.
    #[error("malformed event payload: {0}")]
    Decode(#[source] serde_json::Error),

    /// Payload has no bytes.
    #[error("empty event payload")]
    EmptyPayload,
}

/// Serialize one event into a store payload.
pub fn encode(event: &LocationEvent) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(event).map_err(CodecError::Encode)
}

/// Deserialize a store payload.
pub fn decode(payload: &[u8]) -> Result<LocationEvent, CodecError> {
    if payload.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    serde_json::from_slice(payload).map_err(CodecError::Decode)
}

impl LocationEvent {
    /// Flat JSON object sent to the collector for this event.
    ///
    /// Optional fields that were not collected are omitted.
    pub fn to_wire_json(&self) -> Value {
        let location = &self.location;
        let mut object = Map::new();

        object.insert("latitude".into(), json!(location.latitude));
        object.insert("longitude".into(), json!(location.longitude));
        object.insert("utc_timestamp".into(), json!(self.timestamp.timestamp()));
        object.insert(
            "horizontal_accuracy".into(),
            json!(location.horizontal_accuracy),
        );
        object.insert("vertical_accuracy".into(), json!(location.vertical_accuracy));
        object.insert("altitude".into(), json!(location.altitude));
        object.insert("location_context".into(), json!(self.context.as_ref()));
        object.insert("ad_id".into(), json!(self.advertising.advertising_id));
        object.insert(
            "ad_opt_out".into(),
            json!(self.advertising.is_limited_ad_tracking_enabled),
        );
        object.insert("id_type".into(), json!(ID_TYPE));

        let optional = [
            ("course", location.course.map(Value::from)),
            ("speed", location.speed.map(Value::from)),
            ("wifi_bssid", self.network.bssid.clone().map(Value::from)),
            ("wifi_ssid", self.network.ssid.clone().map(Value::from)),
            ("is_charging", self.device.is_charging.map(Value::from)),
            ("device_model", self.device.device_model.clone().map(Value::from)),
            ("os_version", self.device.os_version.clone().map(Value::from)),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                object.insert(key.into(), value);
            }
        }

        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{
        AdvertisingInfo, DeviceInfo, LocationContext, LocationReading, NetworkInfo,
    };
    use chrono::{TimeZone, Utc};

    fn event() -> LocationEvent {
        let reading = LocationReading::new(40.5, -73.25, Utc.timestamp_opt(1234, 0).unwrap())
            .with_accuracy(30.0, 10.0, 0.0)
            .with_motion(180.0, 20.0);
        LocationEvent {
            timestamp: reading.timestamp,
            location: reading,
            advertising: AdvertisingInfo {
                advertising_id: Some("123".to_string()),
                is_limited_ad_tracking_enabled: false,
            },
            network: NetworkInfo {
                bssid: Some("bssid_goes_here".to_string()),
                ssid: None,
            },
            device: DeviceInfo {
                is_charging: Some(true),
                device_model: None,
                os_version: Some("iOS 11.0.1".to_string()),
            },
            context: LocationContext::BackgroundFetch,
        }
    }

    #[test]
    fn test_decode_restores_event() {
        let original = event();
        let decoded = decode(&encode(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b""), Err(CodecError::EmptyPayload)));
        assert!(matches!(decode(b"not json"), Err(CodecError::Decode(_))));
        assert!(matches!(decode(br#"{"latitude": 1}"#), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_wire_json_shape() {
        let wire = event().to_wire_json();

        assert_eq!(wire["latitude"], json!(40.5));
        assert_eq!(wire["utc_timestamp"], json!(1234));
        assert_eq!(wire["horizontal_accuracy"], json!(10.0));
        assert_eq!(wire["location_context"], json!("background_fetch"));
        assert_eq!(wire["ad_id"], json!("123"));
        assert_eq!(wire["ad_opt_out"], json!(false));
        assert_eq!(wire["id_type"], json!("idfa"));
        assert_eq!(wire["course"], json!(180.0));
        assert_eq!(wire["wifi_bssid"], json!("bssid_goes_here"));
        assert_eq!(wire["is_charging"], json!(true));

        let object = wire.as_object().unwrap();
        assert!(!object.contains_key("wifi_ssid"));
        assert!(!object.contains_key("device_model"));
    }
}
