//! Line-oriented decoder for the serial transport format.
//!
//! Each HCI packet arrives as one text line:
//!
//! ```text
//! [btsnoop]:pkt_type=[0x04],len=[0x0c],data=[0201000...]
//! ```
//!
//! Lines are independent. A malformed line yields a [`FrameError`] and has no
//! effect on the lines that follow it.

use super::{HciFrame, PacketType};
use thiserror::Error;

/// Tag printed by the capture agent in front of every HCI line.
pub const DEFAULT_TAG: &str = "[btsnoop]";

/// Why a transport line could not be turned into a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("line does not start with the expected tag")]
    MissingTag,
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' has invalid value '{value}'")]
    InvalidField { field: &'static str, value: String },
    #[error("data is not valid hex: {0}")]
    InvalidHex(String),
    #[error("declared length {declared} does not match {actual} data bytes")]
    LengthMismatch { declared: u16, actual: usize },
    #[error("unknown packet type 0x{0:02x}")]
    UnknownPacketType(u8),
    #[error("{packet_type} of {len} bytes exceeds the {max}-byte limit")]
    TooLong {
        packet_type: PacketType,
        len: usize,
        max: usize,
    },
}

/// Decodes transport lines carrying a given tag.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    tag: String,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_TAG)
    }
}

impl FrameDecoder {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Classify and decode one line from the serial stream.
    ///
    /// Returns `None` for lines that are not HCI frames at all: blank lines,
    /// `:Stop` markers and ordinary console output. Lines that look like
    /// frames (they carry the tag or a `pkt_type` field) are decoded with
    /// [`FrameDecoder::parse_line`].
    pub fn decode_line(&self, line: &str) -> Option<Result<HciFrame, FrameError>> {
        let line = line.trim();
        if line.is_empty() || line.ends_with(":Stop") {
            return None;
        }
        if !line.contains(self.tag.as_str()) && !line.contains("pkt_type") {
            return None;
        }
        Some(self.parse_line(line))
    }

    /// Strictly parse one transport line into a frame.
    pub fn parse_line(&self, line: &str) -> Result<HciFrame, FrameError> {
        // Some consoles render the "x" of "0x" as a multiplication sign.
        let line = line.trim().replace('×', "x");

        // Console log prefixes may precede the tag.
        let start = line.find(self.tag.as_str()).ok_or(FrameError::MissingTag)?;
        let fields = line[start + self.tag.len()..].trim_start();
        let fields = fields.strip_prefix(':').unwrap_or(fields);

        let pkt_type = field(fields, "pkt_type")?;
        let code = parse_hex_number(pkt_type)
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| FrameError::InvalidField {
                field: "pkt_type",
                value: pkt_type.to_string(),
            })?;
        let packet_type = PacketType::from_code(code).ok_or(FrameError::UnknownPacketType(code))?;

        let len = field(fields, "len")?;
        let declared = parse_hex_number(len)
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| FrameError::InvalidField {
                field: "len",
                value: len.to_string(),
            })?;

        let data = field(fields, "data")?;
        let payload = hex::decode(data).map_err(|e| FrameError::InvalidHex(e.to_string()))?;

        if usize::from(declared) != payload.len() {
            return Err(FrameError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }

        let max = HciFrame::max_payload_len(packet_type);
        if payload.len() > max {
            return Err(FrameError::TooLong {
                packet_type,
                len: payload.len(),
                max,
            });
        }

        Ok(HciFrame {
            packet_type,
            declared_len: declared,
            payload,
        })
    }
}

/// Extract the bracketed value of `name=[value]`, allowing spaces around `=`.
fn field<'a>(line: &'a str, name: &'static str) -> Result<&'a str, FrameError> {
    let mut search = line;
    while let Some(pos) = search.find(name) {
        let after = search[pos + name.len()..].trim_start();
        if let Some(rest) = after.strip_prefix('=') {
            let rest = rest.trim_start();
            let value = rest
                .strip_prefix('[')
                .and_then(|v| v.split_once(']'))
                .map(|(value, _)| value.trim())
                .ok_or(FrameError::MissingField(name))?;
            return Ok(value);
        }
        search = &search[pos + name.len()..];
    }
    Err(FrameError::MissingField(name))
}

fn parse_hex_number(value: &str) -> Option<u32> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> FrameDecoder {
        FrameDecoder::default()
    }

    #[test]
    fn test_parse_le_meta_line() {
        let frame = decoder()
            .parse_line("[btsnoop]:pkt_type=[0x04],len=[0x03],data=[0201ff]")
            .unwrap();
        assert_eq!(frame.packet_type, PacketType::LeMetaEvent);
        assert_eq!(frame.declared_len, 3);
        assert_eq!(frame.payload, vec![0x02, 0x01, 0xFF]);
    }

    #[test]
    fn test_parse_accepts_spacing_and_uppercase() {
        let frame = decoder()
            .parse_line("  [btsnoop]: pkt_type = [0x05], len = [0X02], data = [0E0A]  ")
            .unwrap();
        assert_eq!(frame.packet_type, PacketType::GeneralEvent);
        assert_eq!(frame.payload, vec![0x0E, 0x0A]);
    }

    #[test]
    fn test_parse_normalizes_multiplication_sign() {
        let frame = decoder()
            .parse_line("[btsnoop]:pkt_type=[0×01],len=[0×02],data=[030c]")
            .unwrap();
        assert_eq!(frame.packet_type, PacketType::Command);
    }

    #[test]
    fn test_empty_data() {
        let frame = decoder()
            .parse_line("[btsnoop]:pkt_type=[0x05],len=[0x00],data=[]")
            .unwrap();
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_missing_tag() {
        assert_eq!(
            decoder().parse_line("pkt_type=[0x04],len=[0x01],data=[02]"),
            Err(FrameError::MissingTag)
        );
        assert_eq!(
            decoder().parse_line("[other]:pkt_type=[0x04],len=[0x01],data=[02]"),
            Err(FrameError::MissingTag)
        );
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(
            decoder().parse_line("[btsnoop]:pkt_type=[0x04],len=[0x04],data=[0201ff]"),
            Err(FrameError::LengthMismatch {
                declared: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_le_meta_longer_than_event_header_allows() {
        let at_limit = format!(
            "[btsnoop]:pkt_type=[0x04],len=[0xff],data=[{}]",
            "02".repeat(255)
        );
        assert_eq!(decoder().parse_line(&at_limit).unwrap().payload.len(), 255);

        let over = format!(
            "[btsnoop]:pkt_type=[0x04],len=[0x106],data=[{}]",
            "02".repeat(262)
        );
        assert_eq!(
            decoder().parse_line(&over),
            Err(FrameError::TooLong {
                packet_type: PacketType::LeMetaEvent,
                len: 262,
                max: 255
            })
        );
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(
            decoder().parse_line("[btsnoop]:pkt_type=[0x04],len=[0x02],data=[02zz]"),
            Err(FrameError::InvalidHex(_))
        ));
        // odd number of digits
        assert!(matches!(
            decoder().parse_line("[btsnoop]:pkt_type=[0x04],len=[0x01],data=[020]"),
            Err(FrameError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_missing_and_invalid_fields() {
        assert_eq!(
            decoder().parse_line("[btsnoop]:pkt_type=[0x04],data=[02]"),
            Err(FrameError::MissingField("len"))
        );
        assert_eq!(
            decoder().parse_line("[btsnoop]:pkt_type=[0x04],len=[0x01]"),
            Err(FrameError::MissingField("data"))
        );
        assert!(matches!(
            decoder().parse_line("[btsnoop]:pkt_type=[zz],len=[0x01],data=[02]"),
            Err(FrameError::InvalidField {
                field: "pkt_type",
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_packet_type() {
        assert_eq!(
            decoder().parse_line("[btsnoop]:pkt_type=[0x03],len=[0x01],data=[02]"),
            Err(FrameError::UnknownPacketType(0x03))
        );
    }

    #[test]
    fn test_decode_line_skips_console_noise() {
        let decoder = decoder();
        assert_eq!(decoder.decode_line(""), None);
        assert_eq!(decoder.decode_line("[SNIFFER] Task running"), None);
        assert_eq!(decoder.decode_line("[btsnoop]:Stop"), None);
        assert!(matches!(
            decoder.decode_line("pkt_type=[0x04],len=[0x01],data=[02]"),
            Some(Err(FrameError::MissingTag))
        ));
    }

    #[test]
    fn test_bad_line_does_not_affect_next() {
        let decoder = decoder();
        let lines = [
            "[btsnoop]:pkt_type=[0x04],len=[0x09],data=[02",
            "[btsnoop]:pkt_type=[0x04],len=[0x01],data=[02]",
        ];
        let results: Vec<_> = lines.iter().map(|l| decoder.parse_line(l)).collect();
        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap().payload, vec![0x02]);
    }

    #[test]
    fn test_console_prefix_before_tag() {
        let frame = decoder()
            .parse_line("I (5123) sniffer: [btsnoop]:pkt_type=[0x05],len=[0x01],data=[0e]")
            .unwrap();
        assert_eq!(frame.payload, vec![0x0E]);
    }

    #[test]
    fn test_custom_tag() {
        let decoder = FrameDecoder::new("<hci>");
        assert!(decoder
            .parse_line("<hci>:pkt_type=[0x05],len=[0x01],data=[0e]")
            .is_ok());
    }
}
