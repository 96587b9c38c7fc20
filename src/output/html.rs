//! Static HTML report.

use super::{ExportError, Exporter, date_time, time_of_day};
use crate::device::DeviceRecord;
use crate::session::CaptureSession;
use std::borrow::Cow;
use std::io::Write;
use std::time::SystemTime;

/// Service badges shown per device before collapsing into `+N`.
const MAX_SERVICE_BADGES: usize = 3;

const STYLE: &str = r#"
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
               background: #1a1a2e; color: #eee; padding: 20px; }
        .container { max-width: 1400px; margin: 0 auto; }
        h1 { color: #00d4ff; margin-bottom: 10px; }
        h2 { color: #00d4ff; margin: 20px 0 10px; border-bottom: 1px solid #333; padding-bottom: 5px; }
        .stats-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 15px; margin: 20px 0; }
        .stat-card { background: #16213e; padding: 20px; border-radius: 10px; text-align: center; }
        .stat-value { font-size: 2em; color: #00d4ff; font-weight: bold; }
        .stat-label { color: #888; margin-top: 5px; }
        table { width: 100%; border-collapse: collapse; margin: 15px 0; background: #16213e; border-radius: 10px; overflow: hidden; }
        th { background: #0f3460; color: #00d4ff; padding: 12px; text-align: left; }
        td { padding: 10px 12px; border-bottom: 1px solid #333; }
        tr:hover { background: #1f4068; }
        .rssi-good { color: #4ade80; }
        .rssi-medium { color: #facc15; }
        .rssi-poor { color: #f87171; }
        .badge { display: inline-block; padding: 2px 8px; border-radius: 4px; font-size: 0.8em; margin: 2px; }
        .badge-service { background: #3b82f6; }
        .manufacturer { color: #a78bfa; }
        .timestamp { color: #888; font-size: 0.9em; }
"#;

/// Dark-themed single page with summary cards, the device table and the
/// packet-type distribution.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlExporter;

impl Exporter for HtmlExporter {
    fn name(&self) -> &'static str {
        "HTML"
    }

    fn export(&self, session: &CaptureSession, out: &mut dyn Write) -> Result<(), ExportError> {
        let devices = session.devices().sorted();

        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html lang=\"en\">")?;
        writeln!(out, "<head>")?;
        writeln!(out, "    <meta charset=\"UTF-8\">")?;
        writeln!(out, "    <title>BLE Sniffer Report</title>")?;
        writeln!(out, "    <style>{STYLE}    </style>")?;
        writeln!(out, "</head>")?;
        writeln!(out, "<body>")?;
        writeln!(out, "<div class=\"container\">")?;
        writeln!(out, "    <h1>BLE Sniffer Report</h1>")?;
        writeln!(
            out,
            "    <p class=\"timestamp\">Generated: {}</p>",
            date_time(SystemTime::now())
        )?;

        writeln!(out, "    <div class=\"stats-grid\">")?;
        stat_card(out, &session.total_packets().to_string(), "Total Packets")?;
        stat_card(out, &devices.len().to_string(), "Unique Devices")?;
        stat_card(
            out,
            &format!("{:.1} KB", session.bytes_captured() as f64 / 1024.0),
            "Data Captured",
        )?;
        stat_card(
            out,
            &format!("{:.1}/s", session.packets_per_second()),
            "Packet Rate",
        )?;
        stat_card(
            out,
            &format!("{}s", session.duration().as_secs()),
            "Duration",
        )?;
        writeln!(out, "    </div>")?;

        writeln!(out, "    <h2>Discovered Devices ({})</h2>", devices.len())?;
        writeln!(out, "    <table>")?;
        writeln!(
            out,
            "        <tr><th>MAC Address</th><th>Name</th><th>Manufacturer</th><th>RSSI</th>\
             <th>TX Power</th><th>Services</th><th>Packets</th><th>Last Seen</th></tr>"
        )?;
        for device in &devices {
            device_row(out, device)?;
        }
        writeln!(out, "    </table>")?;

        writeln!(out, "    <h2>Packet Types Distribution</h2>")?;
        writeln!(out, "    <table>")?;
        writeln!(out, "        <tr><th>Type</th><th>Count</th><th>Percentage</th></tr>")?;
        let mut types: Vec<_> = session.packet_types().iter().collect();
        types.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let total = session.total_packets();
        for (label, count) in types {
            let pct = if total > 0 {
                *count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            writeln!(
                out,
                "        <tr><td>{}</td><td>{count}</td><td>{pct:.1}%</td></tr>",
                escape(label)
            )?;
        }
        writeln!(out, "    </table>")?;

        writeln!(out, "</div>")?;
        writeln!(out, "</body>")?;
        writeln!(out, "</html>")?;
        Ok(())
    }
}

fn stat_card(out: &mut dyn Write, value: &str, label: &str) -> std::io::Result<()> {
    writeln!(
        out,
        "        <div class=\"stat-card\"><div class=\"stat-value\">{}</div>\
         <div class=\"stat-label\">{}</div></div>",
        escape(value),
        escape(label)
    )
}

fn device_row(out: &mut dyn Write, device: &DeviceRecord) -> std::io::Result<()> {
    let name = match &device.name {
        Some(name) => escape(name).into_owned(),
        None => "<em style=\"color:#666\">Unknown</em>".to_string(),
    };
    let tx_power = device
        .tx_power
        .map_or_else(|| "-".to_string(), |p| format!("{p} dBm"));

    let services = device.service_names();
    let mut badges: String = services
        .iter()
        .take(MAX_SERVICE_BADGES)
        .map(|s| format!("<span class=\"badge badge-service\">{}</span>", escape(s)))
        .collect();
    if services.len() > MAX_SERVICE_BADGES {
        badges.push_str(&format!(
            "<span class=\"badge\">+{}</span>",
            services.len() - MAX_SERVICE_BADGES
        ));
    }
    if badges.is_empty() {
        badges.push('-');
    }

    writeln!(
        out,
        "        <tr><td><code>{}</code></td><td>{name}</td><td class=\"manufacturer\">{}</td>\
         <td class=\"{}\">{:.0} dBm</td><td>{tx_power}</td><td>{badges}</td><td>{}</td>\
         <td class=\"timestamp\">{}</td></tr>",
        device.address,
        escape(device.manufacturer.unwrap_or("Unknown")),
        rssi_class(device.rssi_avg),
        device.rssi_avg,
        device.packet_count,
        time_of_day(device.last_seen),
    )
}

fn rssi_class(avg: f64) -> &'static str {
    if avg > -60.0 {
        "rssi-good"
    } else if avg > -80.0 {
        "rssi-medium"
    } else {
        "rssi-poor"
    }
}

fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_session;

    fn export() -> String {
        let mut out = Vec::new();
        HtmlExporter.export(&sample_session(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_report_contains_every_device() {
        let html = export();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Discovered Devices (3)"));
        assert_eq!(html.matches("<td><code>").count(), 3);
        assert!(html.contains("<code>AA:BB:CC:DD:EE:FF</code>"));
    }

    #[test]
    fn test_names_are_escaped() {
        let html = export();
        assert!(html.contains("&lt;b&gt;Tag&lt;/b&gt;"));
        assert!(html.contains("Sensor, &quot;A&quot;"));
        assert!(!html.contains("<b>Tag</b>"));
    }

    #[test]
    fn test_packet_type_distribution() {
        let html = export();
        assert!(html.contains("<tr><td>HCI_EVT</td><td>4</td><td>80.0%</td></tr>"));
        assert!(html.contains("<tr><td>HCI_CMD</td><td>1</td><td>20.0%</td></tr>"));
    }

    #[test]
    fn test_rssi_classes() {
        assert_eq!(rssi_class(-59.0), "rssi-good");
        assert_eq!(rssi_class(-60.0), "rssi-medium");
        assert_eq!(rssi_class(-80.0), "rssi-poor");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a & b"), "a &amp; b");
    }
}
