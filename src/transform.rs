//! InternalTransform: maps the external (geosubmit) report schema
//! to the internal (flattened) schema.

use crate::model::report::{ExternalReport, InternalBlue, InternalCell, InternalWifi};
use crate::model::InternalReport;

/// Maps one external-schema report to its internal-schema form, or the
/// empty report if no transmitter data survives. Total: every input
/// report produces some output, never an error.
#[derive(Debug, Clone, Default)]
pub struct InternalTransform;

impl InternalTransform {
    pub fn transform(&self, report: &ExternalReport) -> InternalReport {
        let mut out = InternalReport::default();

        if let Some(position) = &report.position {
            out.lat = position.latitude;
            out.lon = position.longitude;
            out.accuracy = position.accuracy;
            out.altitude = position.altitude;
            out.altitude_accuracy = position.altitude_accuracy;
            out.age = position.age;
            out.heading = position.heading;
            out.pressure = position.pressure;
            out.speed = position.speed;
            out.source = position.source.clone();
        }

        out.timestamp = report.timestamp;

        out.blue = report
            .bluetooth_beacons
            .iter()
            .filter_map(|item| {
                let mapped = InternalBlue {
                    mac: item.mac_address.clone(),
                    age: item.age,
                    signal: item.signal_strength,
                };
                has_any_field(&mapped).then_some(mapped)
            })
            .collect();

        out.cell = report
            .cell_towers
            .iter()
            .filter_map(|item| {
                let mapped = InternalCell {
                    radio: item.radio_type.clone(),
                    mcc: item.mobile_country_code,
                    mnc: item.mobile_network_code,
                    lac: item.location_area_code,
                    cid: item.cell_id,
                    age: item.age,
                    asu: item.asu,
                    psc: item.primary_scrambling_code,
                    serving: item.serving,
                    signal: item.signal_strength,
                    ta: item.timing_advance,
                };
                has_any_cell_field(&mapped).then_some(mapped)
            })
            .collect();

        out.wifi = report
            .wifi_access_points
            .iter()
            .filter_map(|item| {
                let mapped = InternalWifi {
                    mac: item.mac_address.clone(),
                    radio: item.radio_type.clone(),
                    age: item.age,
                    channel: item.channel,
                    frequency: item.frequency,
                    signal_to_noise_ratio: item.signal_to_noise_ratio,
                    signal: item.signal_strength,
                };
                has_any_wifi_field(&mapped).then_some(mapped)
            })
            .collect();

        if out.is_empty() {
            InternalReport::default()
        } else {
            out
        }
    }
}

fn has_any_field(blue: &InternalBlue) -> bool {
    blue.mac.is_some() || blue.age.is_some() || blue.signal.is_some()
}

fn has_any_cell_field(cell: &InternalCell) -> bool {
    cell.radio.is_some()
        || cell.mcc.is_some()
        || cell.mnc.is_some()
        || cell.lac.is_some()
        || cell.cid.is_some()
        || cell.age.is_some()
        || cell.asu.is_some()
        || cell.psc.is_some()
        || cell.serving.is_some()
        || cell.signal.is_some()
        || cell.ta.is_some()
}

fn has_any_wifi_field(wifi: &InternalWifi) -> bool {
    wifi.mac.is_some()
        || wifi.radio.is_some()
        || wifi.age.is_some()
        || wifi.channel.is_some()
        || wifi.frequency.is_some()
        || wifi.signal_to_noise_ratio.is_some()
        || wifi.signal.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::report::{ExternalPosition, ExternalWifi};

    #[test]
    fn maps_position_and_wifi_fields() {
        let report = ExternalReport {
            timestamp: Some(1_500_000_000_000),
            position: Some(ExternalPosition {
                latitude: Some(1.5),
                longitude: Some(2.5),
                accuracy: Some(10.0),
                altitude_accuracy: Some(3.0),
                ..Default::default()
            }),
            wifi_access_points: vec![ExternalWifi {
                mac_address: Some("aa:bb".to_string()),
                signal_strength: Some(-50),
                ..Default::default()
            }],
            ..Default::default()
        };

        let out = InternalTransform.transform(&report);
        assert_eq!(out.lat, Some(1.5));
        assert_eq!(out.lon, Some(2.5));
        assert_eq!(out.accuracy, Some(10.0));
        assert_eq!(out.altitude_accuracy, Some(3.0));
        assert_eq!(out.timestamp, Some(1_500_000_000_000));
        assert_eq!(out.wifi.len(), 1);
        assert_eq!(out.wifi[0].mac.as_deref(), Some("aa:bb"));
        assert_eq!(out.wifi[0].signal, Some(-50));
    }

    #[test]
    fn empty_report_with_no_transmitters_is_dropped() {
        let report = ExternalReport {
            position: Some(ExternalPosition {
                latitude: Some(1.0),
                longitude: Some(2.0),
                ..Default::default()
            }),
            ..Default::default()
        };

        let out = InternalTransform.transform(&report);
        assert!(out.is_empty());
        assert_eq!(out.lat, None);
    }
}
