//! Capture session state: counters, device table and recent packet log.

use crate::advertisement::{AdFields, AdvType};
use crate::device::{DeviceAggregator, PacketFilter};
use crate::hci::report::{self, LeAdvertisingReport};
use crate::hci::{HciFrame, PacketType};
use crate::lookup;
use crate::mac_address::MacAddress;
use log::debug;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Number of recent packets kept for export.
pub const PACKET_LOG_CAPACITY: usize = 10_000;

/// The advertisement carried by a logged packet.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub address: MacAddress,
    pub rssi: i8,
    pub adv_type: AdvType,
    pub name: Option<String>,
    pub services: Vec<u16>,
    pub company_id: Option<u16>,
    pub tx_power: Option<i8>,
    pub flags: Option<u8>,
}

impl ReportSummary {
    fn new(report: &LeAdvertisingReport, fields: &AdFields) -> Self {
        ReportSummary {
            address: report.address,
            rssi: report.rssi,
            adv_type: report.adv_type,
            name: fields.has_name().then(|| fields.name().into_owned()),
            services: fields.service_uuids().to_vec(),
            company_id: fields.company_id(),
            tx_power: fields.tx_power(),
            flags: fields.flags(),
        }
    }
}

/// One accepted packet as kept in the session log.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketRecord {
    pub timestamp: SystemTime,
    pub packet_type: PacketType,
    /// Reconstructed H4 packet
    pub raw: Vec<u8>,
    pub event_code: Option<u8>,
    pub subevent: Option<u8>,
    pub opcode: Option<u16>,
    /// First advertisement in the packet that passed the filter
    pub report: Option<ReportSummary>,
}

impl fmt::Display for PacketRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.packet_type {
            PacketType::LeMetaEvent => {
                let subevent = self.subevent.unwrap_or_default();
                match lookup::le_subevent_name(subevent) {
                    Some(name) => write!(f, "EVT {name}")?,
                    None => write!(f, "EVT 0x{subevent:02X}")?,
                }
                if let Some(report) = &self.report {
                    write!(f, " [{}", report.address)?;
                    if let Some(name) = &report.name {
                        write!(f, " \"{name}\"")?;
                    }
                    write!(f, " {}dBm", report.rssi)?;
                    if !report.services.is_empty() {
                        write!(f, " svc:{}", report.services.len())?;
                    }
                    write!(f, "]")?;
                }
                Ok(())
            }
            PacketType::GeneralEvent => {
                let code = self.event_code.unwrap_or_default();
                match lookup::event_name(code) {
                    Some(name) => write!(f, "EVT {name}"),
                    None => write!(f, "EVT 0x{code:02X}"),
                }
            }
            PacketType::Command => {
                let opcode = self.opcode.unwrap_or_default();
                let ogf = (opcode >> 10) as u8;
                let ocf = opcode & 0x03FF;
                match lookup::ogf_name(ogf) {
                    Some(name) => write!(f, "CMD {name} OCF=0x{ocf:03X}"),
                    None => write!(f, "CMD OGF=0x{ogf:02X} OCF=0x{ocf:03X}"),
                }
            }
            PacketType::AclData => write!(f, "ACL {} bytes", self.raw.len()),
        }
    }
}

/// All state accumulated during one capture run.
#[derive(Debug)]
pub struct CaptureSession {
    start: SystemTime,
    end: Option<SystemTime>,
    total_packets: u64,
    bytes_captured: u64,
    errors: u64,
    packet_types: BTreeMap<&'static str, u64>,
    events_by_type: BTreeMap<u8, u64>,
    devices: DeviceAggregator,
    packets: VecDeque<PacketRecord>,
    filter: PacketFilter,
}

impl CaptureSession {
    pub fn new(start: SystemTime, filter: PacketFilter) -> Self {
        CaptureSession {
            start,
            end: None,
            total_packets: 0,
            bytes_captured: 0,
            errors: 0,
            packet_types: BTreeMap::new(),
            events_by_type: BTreeMap::new(),
            devices: DeviceAggregator::new(),
            packets: VecDeque::new(),
            filter,
        }
    }

    /// Count a line or report that could not be decoded.
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Account for one decoded frame.
    ///
    /// Advertising reports are extracted and folded into the device table.
    /// Returns the logged packet, or `None` when the filter rejected the
    /// frame (in which case nothing but extraction errors is recorded).
    pub fn record_frame(&mut self, frame: &HciFrame, now: SystemTime) -> Option<&PacketRecord> {
        let mut reports = Vec::new();
        if frame.packet_type == PacketType::LeMetaEvent {
            match report::extract(frame) {
                Ok(event) => {
                    if let Some(e) = event.error {
                        debug!("Dropped advertising report: {e}");
                        self.errors += 1;
                    }
                    reports = event.reports;
                }
                Err(e) => {
                    debug!("Malformed LE meta event: {e}");
                    self.errors += 1;
                }
            }
        }

        let decoded: Vec<_> = reports
            .iter()
            .map(|r| (r, r.fields()))
            .filter(|(r, fields)| {
                let name = fields.name();
                let name = fields.has_name().then_some(name.as_ref());
                self.filter.matches(Some(&r.address), name, Some(r.rssi))
            })
            .collect();

        let accepted = if reports.is_empty() {
            self.filter.matches(None, None, None)
        } else {
            !decoded.is_empty()
        };
        if !accepted {
            return None;
        }

        let raw = frame.to_h4();
        self.total_packets += 1;
        self.bytes_captured += raw.len() as u64;
        *self.packet_types.entry(frame.packet_type.label()).or_default() += 1;
        if let Some(code) = frame.event_code() {
            *self.events_by_type.entry(code).or_default() += 1;
        }

        for (report, fields) in &decoded {
            self.devices.observe(
                report.address,
                report.address_type,
                fields,
                report.rssi,
                report.adv_type,
                now,
            );
        }

        if self.packets.len() == PACKET_LOG_CAPACITY {
            self.packets.pop_front();
        }
        self.packets.push_back(PacketRecord {
            timestamp: now,
            packet_type: frame.packet_type,
            raw,
            event_code: frame.event_code(),
            subevent: frame.subevent(),
            opcode: frame.opcode(),
            report: decoded
                .first()
                .map(|(report, fields)| ReportSummary::new(report, fields)),
        });
        self.packets.back()
    }

    /// Stamp the end of the capture. Later calls keep the first stamp.
    pub fn finish(&mut self, end: SystemTime) {
        self.end.get_or_insert(end);
    }

    pub fn start_time(&self) -> SystemTime {
        self.start
    }

    /// End time, or `now` if the capture is still running.
    pub fn end_time(&self) -> SystemTime {
        self.end.unwrap_or_else(SystemTime::now)
    }

    pub fn duration(&self) -> Duration {
        self.end_time()
            .duration_since(self.start)
            .unwrap_or_default()
    }

    pub fn packets_per_second(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 {
            self.total_packets as f64 / secs
        } else {
            0.0
        }
    }

    pub fn total_packets(&self) -> u64 {
        self.total_packets
    }

    pub fn bytes_captured(&self) -> u64 {
        self.bytes_captured
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn packet_types(&self) -> &BTreeMap<&'static str, u64> {
        &self.packet_types
    }

    pub fn events_by_type(&self) -> &BTreeMap<u8, u64> {
        &self.events_by_type
    }

    pub fn devices(&self) -> &DeviceAggregator {
        &self.devices
    }

    /// Recent packets, oldest first.
    pub fn packets(&self) -> impl Iterator<Item = &PacketRecord> {
        self.packets.iter()
    }
}
