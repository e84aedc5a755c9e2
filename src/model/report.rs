//! Data model: the ingress envelope, the external (geosubmit) report
//! schema, and the internal (flattened) report schema produced by
//! [`crate::transform::InternalTransform`].

use serde::{Deserialize, Serialize};

/// Ingress envelope: `{api_key, nickname, report}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub api_key: Option<String>,
    pub nickname: Option<String>,
    pub report: ExternalReport,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalPosition {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub altitude: Option<f64>,
    #[serde(rename = "altitudeAccuracy")]
    pub altitude_accuracy: Option<f64>,
    pub age: Option<i64>,
    pub heading: Option<f64>,
    pub pressure: Option<f64>,
    pub speed: Option<f64>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalBlue {
    #[serde(rename = "macAddress")]
    pub mac_address: Option<String>,
    pub age: Option<i64>,
    #[serde(rename = "signalStrength")]
    pub signal_strength: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalCell {
    #[serde(rename = "radioType")]
    pub radio_type: Option<String>,
    #[serde(rename = "mobileCountryCode")]
    pub mobile_country_code: Option<u16>,
    #[serde(rename = "mobileNetworkCode")]
    pub mobile_network_code: Option<u16>,
    #[serde(rename = "locationAreaCode")]
    pub location_area_code: Option<u32>,
    #[serde(rename = "cellId")]
    pub cell_id: Option<u64>,
    pub age: Option<i64>,
    pub asu: Option<i32>,
    #[serde(rename = "primaryScramblingCode")]
    pub primary_scrambling_code: Option<u32>,
    pub serving: Option<u8>,
    #[serde(rename = "signalStrength")]
    pub signal_strength: Option<i32>,
    #[serde(rename = "timingAdvance")]
    pub timing_advance: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalWifi {
    #[serde(rename = "macAddress")]
    pub mac_address: Option<String>,
    #[serde(rename = "radioType")]
    pub radio_type: Option<String>,
    pub age: Option<i64>,
    pub channel: Option<i32>,
    pub frequency: Option<i32>,
    #[serde(rename = "signalToNoiseRatio")]
    pub signal_to_noise_ratio: Option<i32>,
    #[serde(rename = "signalStrength")]
    pub signal_strength: Option<i32>,
}

/// The external (geosubmit v2) report schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalReport {
    pub timestamp: Option<i64>,
    pub position: Option<ExternalPosition>,
    #[serde(rename = "bluetoothBeacons", default)]
    pub bluetooth_beacons: Vec<ExternalBlue>,
    #[serde(rename = "cellTowers", default)]
    pub cell_towers: Vec<ExternalCell>,
    #[serde(rename = "wifiAccessPoints", default)]
    pub wifi_access_points: Vec<ExternalWifi>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InternalBlue {
    pub mac: Option<String>,
    pub age: Option<i64>,
    pub signal: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InternalCell {
    pub radio: Option<String>,
    pub mcc: Option<u16>,
    pub mnc: Option<u16>,
    pub lac: Option<u32>,
    pub cid: Option<u64>,
    pub age: Option<i64>,
    pub asu: Option<i32>,
    pub psc: Option<u32>,
    pub serving: Option<u8>,
    pub signal: Option<i32>,
    pub ta: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InternalWifi {
    pub mac: Option<String>,
    pub radio: Option<String>,
    pub age: Option<i64>,
    pub channel: Option<i32>,
    pub frequency: Option<i32>,
    #[serde(rename = "signalToNoiseRatio")]
    pub signal_to_noise_ratio: Option<i32>,
    pub signal: Option<i32>,
}

/// The internal (submit v1) report schema: position fields inlined,
/// `time` a whole-second UTC instant, and shortened transmitter arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InternalReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub blue: Vec<InternalBlue>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub cell: Vec<InternalCell>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub wifi: Vec<InternalWifi>,
}

impl InternalReport {
    /// Empty iff no transmitter survived the transform.
    pub fn is_empty(&self) -> bool {
        self.blue.is_empty() && self.cell.is_empty() && self.wifi.is_empty()
    }
}
