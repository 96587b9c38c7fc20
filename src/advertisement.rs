//! Advertisement data model and AD structure decoding.
//!
//! Both halves of the system share this module: the capture agent decodes
//! every raw advertisement it receives from the radio, and the host decodes
//! the AD bytes carried inside LE Advertising Reports.
//!
//! Decoded records have fixed capacity so they can live in the capture
//! buffer without allocation:
//! - device name: 31 bytes
//! - manufacturer payload: 64 bytes
//! - 16-bit service UUIDs: 8 entries
//!
//! Anything beyond those limits is dropped silently.

use crate::mac_address::MacAddress;
use heapless::Vec as HVec;
use std::borrow::Cow;
use std::fmt;

/// Maximum advertisement payload length accepted from the radio.
pub const MAX_PAYLOAD_LEN: usize = 255;
/// Maximum stored device name length in bytes.
pub const MAX_NAME_LEN: usize = 31;
/// Maximum stored manufacturer payload length (after the company ID).
pub const MAX_MANUFACTURER_DATA: usize = 64;
/// Maximum number of 16-bit service UUIDs kept per advertisement.
pub const MAX_SERVICE_UUIDS: usize = 8;
/// TX power sentinel meaning "not present in the advertisement".
pub const TX_POWER_NOT_PRESENT: i8 = -128;

/// AD structure type codes (Bluetooth Core Supplement, part A).
pub mod ad_type {
    pub const FLAGS: u8 = 0x01;
    pub const UUID16_INCOMPLETE: u8 = 0x02;
    pub const UUID16_COMPLETE: u8 = 0x03;
    pub const UUID32_INCOMPLETE: u8 = 0x04;
    pub const UUID32_COMPLETE: u8 = 0x05;
    pub const UUID128_INCOMPLETE: u8 = 0x06;
    pub const UUID128_COMPLETE: u8 = 0x07;
    pub const SHORT_NAME: u8 = 0x08;
    pub const COMPLETE_NAME: u8 = 0x09;
    pub const TX_POWER: u8 = 0x0A;
    pub const DEVICE_CLASS: u8 = 0x0D;
    pub const APPEARANCE: u8 = 0x19;
    pub const ADV_INTERVAL: u8 = 0x1A;
    pub const MANUFACTURER_DATA: u8 = 0xFF;
}

/// Advertising PDU type as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdvType {
    AdvInd,
    AdvDirectInd,
    AdvScanInd,
    AdvNonconnInd,
    ScanRsp,
    Unknown(u8),
}

impl AdvType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => AdvType::AdvInd,
            0x01 => AdvType::AdvDirectInd,
            0x02 => AdvType::AdvScanInd,
            0x03 => AdvType::AdvNonconnInd,
            0x04 => AdvType::ScanRsp,
            other => AdvType::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            AdvType::AdvInd => 0x00,
            AdvType::AdvDirectInd => 0x01,
            AdvType::AdvScanInd => 0x02,
            AdvType::AdvNonconnInd => 0x03,
            AdvType::ScanRsp => 0x04,
            AdvType::Unknown(code) => code,
        }
    }
}

impl fmt::Display for AdvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvType::AdvInd => write!(f, "ADV_IND"),
            AdvType::AdvDirectInd => write!(f, "ADV_DIRECT_IND"),
            AdvType::AdvScanInd => write!(f, "ADV_SCAN_IND"),
            AdvType::AdvNonconnInd => write!(f, "ADV_NONCONN_IND"),
            AdvType::ScanRsp => write!(f, "SCAN_RSP"),
            AdvType::Unknown(code) => write!(f, "0x{code:02X}"),
        }
    }
}

/// Advertiser address type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressType {
    #[default]
    Public,
    Random,
}

impl AddressType {
    /// Any non-zero code is treated as a random address.
    pub fn from_code(code: u8) -> Self {
        if code == 0 {
            AddressType::Public
        } else {
            AddressType::Random
        }
    }

    pub fn code(self) -> u8 {
        match self {
            AddressType::Public => 0,
            AddressType::Random => 1,
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::Public => write!(f, "public"),
            AddressType::Random => write!(f, "random"),
        }
    }
}

/// One advertisement exactly as delivered by the radio driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAdvertisement {
    pub address: MacAddress,
    /// Signal strength in dBm
    pub rssi: i8,
    /// Advertising channel (37, 38 or 39)
    pub channel: u8,
    /// Milliseconds since the agent booted
    pub timestamp: u32,
    pub adv_type: AdvType,
    pub address_type: AddressType,
    pub payload: HVec<u8, MAX_PAYLOAD_LEN>,
}

impl RawAdvertisement {
    /// Build a raw advertisement; payloads longer than 255 bytes are truncated.
    pub fn new(
        address: MacAddress,
        rssi: i8,
        channel: u8,
        timestamp: u32,
        adv_type: AdvType,
        address_type: AddressType,
        payload: &[u8],
    ) -> Self {
        Self {
            address,
            rssi,
            channel,
            timestamp,
            adv_type,
            address_type,
            payload: truncated(payload),
        }
    }
}

fn truncated<const N: usize>(bytes: &[u8]) -> HVec<u8, N> {
    bytes.iter().take(N).copied().collect()
}

/// Iterator over the `[length][type][data..]` entries of an advertisement payload.
///
/// Iteration ends at the end of the payload, at a zero length byte, or at an
/// entry whose declared length runs past the payload end. Entries already
/// yielded stay valid in all three cases.
pub struct AdStructures<'a> {
    payload: &'a [u8],
    offset: usize,
}

impl<'a> AdStructures<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload, offset: 0 }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    /// `(ad_type, data)`
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.payload.get(self.offset..)?;
        let (&len, rest) = rest.split_first()?;
        let len = usize::from(len);
        if len == 0 || len > rest.len() {
            self.offset = self.payload.len();
            return None;
        }
        self.offset += 1 + len;
        Some((rest[0], &rest[1..len]))
    }
}

/// Fields decoded from an advertisement payload.
///
/// Absent values use the same sentinels the capture agent stores in its fixed
/// layout (empty name, TX power -128, zero appearance/flags/company); the
/// accessors map those to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdFields {
    name: HVec<u8, MAX_NAME_LEN>,
    tx_power: i8,
    appearance: u16,
    flags: u8,
    company_id: u16,
    manufacturer_data: HVec<u8, MAX_MANUFACTURER_DATA>,
    service_uuids: HVec<u16, MAX_SERVICE_UUIDS>,
}

impl Default for AdFields {
    fn default() -> Self {
        Self {
            name: HVec::new(),
            tx_power: TX_POWER_NOT_PRESENT,
            appearance: 0,
            flags: 0,
            company_id: 0,
            manufacturer_data: HVec::new(),
            service_uuids: HVec::new(),
        }
    }
}

impl AdFields {
    /// Decode every AD structure in `payload`.
    ///
    /// The whole payload is always scanned: later entries overwrite earlier
    /// ones of the same kind (the last name wins), while service UUIDs
    /// accumulate up to capacity. A malformed tail stops decoding and keeps
    /// whatever was decoded before it.
    pub fn parse(payload: &[u8]) -> Self {
        let mut fields = AdFields::default();

        for (kind, data) in AdStructures::new(payload) {
            match kind {
                ad_type::FLAGS => {
                    if let Some(&flags) = data.first() {
                        fields.flags = flags;
                    }
                }
                ad_type::SHORT_NAME | ad_type::COMPLETE_NAME => {
                    fields.name = truncated(data);
                }
                ad_type::TX_POWER => {
                    if let Some(&level) = data.first() {
                        fields.tx_power = level as i8;
                    }
                }
                ad_type::APPEARANCE => {
                    if let [lo, hi, ..] = data {
                        fields.appearance = u16::from_le_bytes([*lo, *hi]);
                    }
                }
                ad_type::UUID16_INCOMPLETE | ad_type::UUID16_COMPLETE => {
                    for pair in data.chunks_exact(2) {
                        if fields
                            .service_uuids
                            .push(u16::from_le_bytes([pair[0], pair[1]]))
                            .is_err()
                        {
                            break;
                        }
                    }
                }
                ad_type::MANUFACTURER_DATA => {
                    if let [lo, hi, rest @ ..] = data {
                        fields.company_id = u16::from_le_bytes([*lo, *hi]);
                        fields.manufacturer_data = truncated(rest);
                    }
                }
                _ => {}
            }
        }

        fields
    }

    /// Device name, empty when the advertisement carried none.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn tx_power(&self) -> Option<i8> {
        (self.tx_power != TX_POWER_NOT_PRESENT).then_some(self.tx_power)
    }

    /// Raw TX power byte including the "not present" sentinel.
    pub fn tx_power_raw(&self) -> i8 {
        self.tx_power
    }

    pub fn appearance(&self) -> Option<u16> {
        (self.appearance != 0).then_some(self.appearance)
    }

    pub fn flags(&self) -> Option<u8> {
        (self.flags != 0).then_some(self.flags)
    }

    pub fn company_id(&self) -> Option<u16> {
        (self.company_id != 0).then_some(self.company_id)
    }

    pub fn manufacturer_data(&self) -> &[u8] {
        &self.manufacturer_data
    }

    pub fn service_uuids(&self) -> &[u16] {
        &self.service_uuids
    }
}

/// A raw advertisement together with its decoded fields.
///
/// Built once by [`DecodedAdvertisement::decode`] and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAdvertisement {
    raw: RawAdvertisement,
    fields: AdFields,
}

impl DecodedAdvertisement {
    pub fn decode(raw: RawAdvertisement) -> Self {
        let fields = AdFields::parse(&raw.payload);
        Self { raw, fields }
    }

    pub fn raw(&self) -> &RawAdvertisement {
        &self.raw
    }

    pub fn fields(&self) -> &AdFields {
        &self.fields
    }
}
