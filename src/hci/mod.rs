//! HCI frames carried by the serial log stream.
//!
//! The capture agent prints one transport line per HCI packet. [`frame`]
//! turns those lines back into [`HciFrame`] values and [`report`] pulls LE
//! Advertising Reports out of LE Meta events.

pub mod frame;
pub mod report;

use std::fmt;

/// H4 packet indicator for commands.
pub const H4_COMMAND: u8 = 0x01;
/// H4 packet indicator for ACL data.
pub const H4_ACL_DATA: u8 = 0x02;
/// H4 packet indicator for events.
pub const H4_EVENT: u8 = 0x04;

/// Event code of the LE Meta event.
pub const EVT_LE_META: u8 = 0x3E;
/// LE Meta sub-event code of the LE Advertising Report.
pub const LE_ADVERTISING_REPORT: u8 = 0x02;

/// Transport-level packet type, as printed in the `pkt_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Command,
    AclData,
    LeMetaEvent,
    GeneralEvent,
}

impl PacketType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(PacketType::Command),
            0x02 => Some(PacketType::AclData),
            0x04 => Some(PacketType::LeMetaEvent),
            0x05 => Some(PacketType::GeneralEvent),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PacketType::Command => 0x01,
            PacketType::AclData => 0x02,
            PacketType::LeMetaEvent => 0x04,
            PacketType::GeneralEvent => 0x05,
        }
    }

    /// Key used in the packet-type histogram.
    pub fn label(self) -> &'static str {
        match self {
            PacketType::Command => "HCI_CMD",
            PacketType::AclData => "HCI_ACL",
            PacketType::LeMetaEvent | PacketType::GeneralEvent => "HCI_EVT",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketType::Command => write!(f, "command"),
            PacketType::AclData => write!(f, "ACL data"),
            PacketType::LeMetaEvent => write!(f, "LE meta event"),
            PacketType::GeneralEvent => write!(f, "event"),
        }
    }
}

/// One decoded transport line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciFrame {
    pub packet_type: PacketType,
    /// Length announced by the `len` field; always equals `payload.len()`
    /// for frames produced by [`frame::FrameDecoder`].
    pub declared_len: u16,
    pub payload: Vec<u8>,
}

impl HciFrame {
    pub fn new(packet_type: PacketType, payload: Vec<u8>) -> Self {
        Self {
            packet_type,
            declared_len: payload.len() as u16,
            payload,
        }
    }

    /// HCI event code, if this frame is an event.
    ///
    /// LE Meta lines omit the event code (it is implied by the packet type);
    /// general event lines carry it as their first byte.
    pub fn event_code(&self) -> Option<u8> {
        match self.packet_type {
            PacketType::LeMetaEvent => Some(EVT_LE_META),
            PacketType::GeneralEvent => self.payload.first().copied(),
            _ => None,
        }
    }

    /// LE Meta sub-event code.
    pub fn subevent(&self) -> Option<u8> {
        match self.packet_type {
            PacketType::LeMetaEvent => self.payload.first().copied(),
            _ => None,
        }
    }

    /// Command opcode (little-endian in the first two payload bytes).
    pub fn opcode(&self) -> Option<u16> {
        match (self.packet_type, self.payload.as_slice()) {
            (PacketType::Command, [lo, hi, ..]) => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }

    /// Largest payload whose H4 header can still describe it.
    ///
    /// Commands and LE Meta events carry a one-byte length; a general event
    /// already holds its own header and ACL data has a 16-bit length.
    pub fn max_payload_len(packet_type: PacketType) -> usize {
        match packet_type {
            PacketType::Command => 2 + usize::from(u8::MAX),
            PacketType::LeMetaEvent => usize::from(u8::MAX),
            PacketType::AclData => 2 + usize::from(u16::MAX),
            PacketType::GeneralEvent => 2 + usize::from(u8::MAX),
        }
    }

    /// Rebuild the full H4 packet (indicator byte plus HCI header) for
    /// capture-file output.
    ///
    /// Bytes beyond [`HciFrame::max_payload_len`] are left out so that the
    /// header always agrees with the body.
    pub fn to_h4(&self) -> Vec<u8> {
        let max = Self::max_payload_len(self.packet_type);
        let payload = &self.payload[..self.payload.len().min(max)];
        let mut packet = Vec::with_capacity(payload.len() + 5);

        match self.packet_type {
            PacketType::Command => {
                packet.push(H4_COMMAND);
                if let [lo, hi, params @ ..] = payload {
                    packet.extend_from_slice(&[*lo, *hi, params.len() as u8]);
                    packet.extend_from_slice(params);
                } else {
                    packet.extend_from_slice(payload);
                }
            }
            PacketType::AclData => {
                packet.push(H4_ACL_DATA);
                if let [h0, h1, data @ ..] = payload {
                    let len = data.len() as u16;
                    packet.extend_from_slice(&[*h0, *h1]);
                    packet.extend_from_slice(&len.to_le_bytes());
                    packet.extend_from_slice(data);
                } else {
                    packet.extend_from_slice(payload);
                }
            }
            PacketType::LeMetaEvent => {
                packet.extend_from_slice(&[H4_EVENT, EVT_LE_META, payload.len() as u8]);
                packet.extend_from_slice(payload);
            }
            PacketType::GeneralEvent => {
                packet.push(H4_EVENT);
                packet.extend_from_slice(payload);
            }
        }

        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_codes() {
        for code in [0x01, 0x02, 0x04, 0x05] {
            assert_eq!(PacketType::from_code(code).unwrap().code(), code);
        }
        assert_eq!(PacketType::from_code(0x03), None);
        assert_eq!(PacketType::LeMetaEvent.label(), "HCI_EVT");
    }

    #[test]
    fn test_le_meta_h4() {
        let frame = HciFrame::new(PacketType::LeMetaEvent, vec![0x02, 0x01, 0xAA]);
        assert_eq!(frame.to_h4(), vec![0x04, 0x3E, 0x03, 0x02, 0x01, 0xAA]);
        assert_eq!(frame.event_code(), Some(EVT_LE_META));
        assert_eq!(frame.subevent(), Some(LE_ADVERTISING_REPORT));
    }

    #[test]
    fn test_oversized_le_meta_h4_keeps_header_consistent() {
        let frame = HciFrame::new(PacketType::LeMetaEvent, vec![0xAB; 262]);
        let h4 = frame.to_h4();
        assert_eq!(h4[2], 0xFF);
        assert_eq!(h4.len() - 3, usize::from(h4[2]));
    }

    #[test]
    fn test_general_event_h4_is_prefixed_only() {
        let frame = HciFrame::new(
            PacketType::GeneralEvent,
            vec![0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00],
        );
        assert_eq!(frame.to_h4(), vec![0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00]);
        assert_eq!(frame.event_code(), Some(0x0E));
        assert_eq!(frame.subevent(), None);
    }

    #[test]
    fn test_command_h4_inserts_parameter_length() {
        // LE Set Scan Enable: opcode 0x200C, params [01 00]
        let frame = HciFrame::new(PacketType::Command, vec![0x0C, 0x20, 0x01, 0x00]);
        assert_eq!(frame.to_h4(), vec![0x01, 0x0C, 0x20, 0x02, 0x01, 0x00]);
        assert_eq!(frame.opcode(), Some(0x200C));
    }

    #[test]
    fn test_acl_h4_inserts_data_length() {
        let frame = HciFrame::new(PacketType::AclData, vec![0x40, 0x20, 0xDE, 0xAD, 0xBE]);
        assert_eq!(
            frame.to_h4(),
            vec![0x02, 0x40, 0x20, 0x03, 0x00, 0xDE, 0xAD, 0xBE]
        );
    }
}
