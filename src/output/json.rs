//! JSON export of the full session.

use super::{ExportError, Exporter, rfc3339};
use crate::device::DeviceRecord;
use crate::mac_address::MacAddress;
use crate::session::{CaptureSession, PacketRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::time::SystemTime;

#[derive(Serialize)]
struct Export<'a> {
    capture_info: CaptureInfo,
    statistics: Statistics<'a>,
    devices: Vec<DeviceEntry<'a>>,
    packets: Vec<PacketEntry<'a>>,
}

#[derive(Serialize)]
struct CaptureInfo {
    start_time: String,
    end_time: String,
    duration_seconds: f64,
    total_packets: u64,
    bytes_captured: u64,
    errors: u64,
}

#[derive(Serialize)]
struct Statistics<'a> {
    packet_types: &'a BTreeMap<&'static str, u64>,
    events_by_type: BTreeMap<String, u64>,
    packets_per_second: f64,
}

#[derive(Serialize)]
struct DeviceEntry<'a> {
    mac: MacAddress,
    name: Option<&'a str>,
    manufacturer: &'static str,
    addr_type: String,
    rssi_min: i8,
    rssi_max: i8,
    rssi_avg: f64,
    tx_power: Option<i8>,
    appearance: Option<String>,
    appearance_code: Option<String>,
    services: Vec<String>,
    service_uuids: Vec<String>,
    company_id: Option<String>,
    company_name: Option<&'static str>,
    flags: Option<String>,
    first_seen: String,
    last_seen: String,
    packet_count: u64,
    adv_types: Vec<String>,
    mfg_data_hex: Option<String>,
}

impl<'a> From<&'a DeviceRecord> for DeviceEntry<'a> {
    fn from(device: &'a DeviceRecord) -> Self {
        DeviceEntry {
            mac: device.address,
            name: device.name.as_deref(),
            manufacturer: device.manufacturer.unwrap_or("Unknown"),
            addr_type: device.address_type.to_string(),
            rssi_min: device.rssi_min,
            rssi_max: device.rssi_max,
            rssi_avg: (device.rssi_avg * 10.0).round() / 10.0,
            tx_power: device.tx_power,
            appearance: device.appearance_name(),
            appearance_code: device.appearance.map(|code| format!("0x{code:04X}")),
            services: device.service_names(),
            service_uuids: device
                .services
                .iter()
                .map(|uuid| format!("0x{uuid:04X}"))
                .collect(),
            company_id: device.company_id.map(|id| format!("0x{id:04X}")),
            company_name: device.company_name(),
            flags: device.flags.map(|flags| format!("0x{flags:02X}")),
            first_seen: rfc3339(device.first_seen),
            last_seen: rfc3339(device.last_seen),
            packet_count: device.packet_count,
            adv_types: device.adv_type_names(),
            mfg_data_hex: (!device.manufacturer_data.is_empty())
                .then(|| hex::encode(&device.manufacturer_data)),
        }
    }
}

#[derive(Serialize)]
struct PacketEntry<'a> {
    timestamp: f64,
    timestamp_iso: String,
    packet_type: &'static str,
    raw_hex: String,
    mac: Option<MacAddress>,
    rssi: Option<i8>,
    name: Option<&'a str>,
    event_code: Option<u8>,
    subevent: Option<u8>,
    adv_type: Option<String>,
    services: Vec<String>,
    company_id: Option<String>,
    tx_power: Option<i8>,
    flags: Option<String>,
}

impl<'a> From<&'a PacketRecord> for PacketEntry<'a> {
    fn from(packet: &'a PacketRecord) -> Self {
        let report = packet.report.as_ref();
        PacketEntry {
            timestamp: packet
                .timestamp
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64(),
            timestamp_iso: rfc3339(packet.timestamp),
            packet_type: packet.packet_type.label(),
            raw_hex: hex::encode(&packet.raw),
            mac: report.map(|r| r.address),
            rssi: report.map(|r| r.rssi),
            name: report.and_then(|r| r.name.as_deref()),
            event_code: packet.event_code,
            subevent: packet.subevent,
            adv_type: report.map(|r| r.adv_type.to_string()),
            services: report
                .map(|r| {
                    r.services
                        .iter()
                        .map(|uuid| crate::lookup::service_name_or_hex(*uuid))
                        .collect()
                })
                .unwrap_or_default(),
            company_id: report
                .and_then(|r| r.company_id)
                .map(|id| format!("0x{id:04X}")),
            tx_power: report.and_then(|r| r.tx_power),
            flags: report
                .and_then(|r| r.flags)
                .map(|flags| format!("0x{flags:02X}")),
        }
    }
}

/// Pretty-printed JSON document with capture info, statistics, devices and
/// the recent packet log.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn name(&self) -> &'static str {
        "JSON"
    }

    fn export(&self, session: &CaptureSession, out: &mut dyn Write) -> Result<(), ExportError> {
        let export = Export {
            capture_info: CaptureInfo {
                start_time: rfc3339(session.start_time()),
                end_time: rfc3339(session.end_time()),
                duration_seconds: session.duration().as_secs_f64(),
                total_packets: session.total_packets(),
                bytes_captured: session.bytes_captured(),
                errors: session.errors(),
            },
            statistics: Statistics {
                packet_types: session.packet_types(),
                events_by_type: session
                    .events_by_type()
                    .iter()
                    .map(|(code, count)| (format!("0x{code:02X}"), *count))
                    .collect(),
                packets_per_second: session.packets_per_second(),
            },
            devices: session
                .devices()
                .sorted()
                .into_iter()
                .map(DeviceEntry::from)
                .collect(),
            packets: session.packets().map(PacketEntry::from).collect(),
        };

        serde_json::to_writer_pretty(&mut *out, &export)?;
        writeln!(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_MAC, sample_session};
    use serde_json::Value;

    fn export_value(session: &CaptureSession) -> Value {
        let mut out = Vec::new();
        JsonExporter.export(session, &mut out).unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn test_top_level_layout() {
        let value = export_value(&sample_session());

        let info = &value["capture_info"];
        assert_eq!(info["total_packets"], 5);
        assert_eq!(info["errors"], 1);
        assert_eq!(info["start_time"], "2023-11-14T22:13:20Z");
        assert_eq!(info["duration_seconds"], 10.0);

        let stats = &value["statistics"];
        assert_eq!(stats["packet_types"]["HCI_EVT"], 4);
        assert_eq!(stats["packet_types"]["HCI_CMD"], 1);
        assert_eq!(stats["events_by_type"]["0x3E"], 4);
        assert_eq!(stats["packets_per_second"], 0.5);

        assert_eq!(value["devices"].as_array().unwrap().len(), 3);
        assert_eq!(value["packets"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_device_entry() {
        let value = export_value(&sample_session());
        let device = &value["devices"][0];

        // most packets first
        assert_eq!(device["mac"], TEST_MAC.to_string());
        assert_eq!(device["packet_count"], 2);
        assert_eq!(device["name"], "Sensor, \"A\"");
        assert_eq!(device["rssi_min"], -70);
        assert_eq!(device["rssi_max"], -50);
        assert_eq!(device["rssi_avg"], -60.0);
        assert_eq!(device["services"], serde_json::json!(["Battery"]));
        assert_eq!(device["service_uuids"], serde_json::json!(["0x180F"]));
        assert_eq!(device["company_id"], "0x004C");
        assert_eq!(device["company_name"], "Apple");
        assert_eq!(device["mfg_data_hex"], "0215");
        assert_eq!(device["manufacturer"], "Unknown");
        assert_eq!(device["adv_types"], serde_json::json!(["ADV_IND"]));
    }

    #[test]
    fn test_packet_entry() {
        let value = export_value(&sample_session());
        let packet = &value["packets"][0];

        assert_eq!(packet["packet_type"], "HCI_EVT");
        assert_eq!(packet["mac"], TEST_MAC.to_string());
        assert_eq!(packet["subevent"], 2);
        assert_eq!(packet["adv_type"], "ADV_IND");
        assert!(packet["raw_hex"].as_str().unwrap().starts_with("043e"));

        let command = &value["packets"][4];
        assert_eq!(command["packet_type"], "HCI_CMD");
        assert!(command["mac"].is_null());
    }
}
