//! CSV export: one row per device.

use super::{ExportError, Exporter, date_time};
use crate::device::DeviceRecord;
use crate::session::CaptureSession;
use csv::{Terminator, WriterBuilder};
use std::io::Write;

const HEADER: [&str; 16] = [
    "MAC Address",
    "Name",
    "Manufacturer",
    "Address Type",
    "RSSI (Avg)",
    "RSSI (Min)",
    "RSSI (Max)",
    "TX Power",
    "Appearance",
    "Services",
    "Company ID",
    "Company Name",
    "First Seen",
    "Last Seen",
    "Packet Count",
    "ADV Types",
];

/// Separator for multi-valued cells.
const LIST_SEPARATOR: &str = "; ";

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvExporter;

impl Exporter for CsvExporter {
    fn name(&self) -> &'static str {
        "CSV"
    }

    fn export(&self, session: &CaptureSession, out: &mut dyn Write) -> Result<(), ExportError> {
        let mut writer = WriterBuilder::new()
            .terminator(Terminator::CRLF)
            .from_writer(out);
        writer.write_record(HEADER)?;
        for device in session.devices().sorted() {
            writer.write_record(device_row(device))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn device_row(device: &DeviceRecord) -> [String; 16] {
    [
        device.address.to_string(),
        device.name.clone().unwrap_or_default(),
        device.manufacturer.unwrap_or("Unknown").to_string(),
        device.address_type.to_string(),
        format!("{:.1}", device.rssi_avg),
        device.rssi_min.to_string(),
        device.rssi_max.to_string(),
        device.tx_power.map(|p| p.to_string()).unwrap_or_default(),
        device.appearance_name().unwrap_or_default(),
        device.service_names().join(LIST_SEPARATOR),
        device
            .company_id
            .map(|id| format!("0x{id:04X}"))
            .unwrap_or_default(),
        device.company_name().unwrap_or_default().to_string(),
        date_time(device.first_seen),
        date_time(device.last_seen),
        device.packet_count.to_string(),
        device.adv_type_names().join(LIST_SEPARATOR),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_session;

    fn export(session: &CaptureSession) -> String {
        let mut out = Vec::new();
        CsvExporter.export(session, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_header_and_row_count() {
        let session = sample_session();
        let text = export(&session);
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(lines.len(), 1 + session.devices().len());
    }

    #[test]
    fn test_device_row() {
        let text = export(&sample_session());
        let row = text.lines().nth(1).unwrap();

        assert_eq!(
            row,
            "AA:BB:CC:DD:EE:FF,\"Sensor, \"\"A\"\"\",Unknown,public,-60.0,-70,-50,,,Battery,\
             0x004C,Apple,2023-11-14 22:13:21,2023-11-14 22:13:23,2,ADV_IND"
        );
    }

    #[test]
    fn test_cells_are_quoted_when_needed() {
        let mut out = Vec::new();
        {
            let mut writer = WriterBuilder::new()
                .terminator(Terminator::CRLF)
                .from_writer(&mut out);
            writer
                .write_record(["plain", "a,b", "say \"hi\"", "two\nlines", ""])
                .unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "plain,\"a,b\",\"say \"\"hi\"\"\",\"two\nlines\",\r\n"
        );
    }

    #[test]
    fn test_rows_end_with_crlf() {
        let text = export(&sample_session());
        assert!(text.ends_with("\r\n"));
        assert_eq!(text.matches("\r\n").count(), 1 + sample_session().devices().len());
    }
}
