//! Compact 6-byte Bluetooth device address.
//!
//! Addresses are stored in display order (most significant byte first).
//! HCI transmits them least-significant byte first, so anything read off the
//! wire goes through [`MacAddress::from_le_bytes`].

use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;

/// A Bluetooth device address stored as a compact 6-byte array.
///
/// Cheap to copy and hash, so it is used directly as the device map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Build an address from HCI wire order (least-significant byte first).
    pub fn from_le_bytes(mut bytes: [u8; 6]) -> Self {
        bytes.reverse();
        Self(bytes)
    }

    /// Bytes in HCI wire order.
    pub fn to_le_bytes(self) -> [u8; 6] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    /// The organizationally unique identifier: the first three bytes.
    pub fn oui(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Errors returned when parsing a MAC address string.
#[derive(Error, Debug, PartialEq)]
pub enum ParseMacError {
    #[error("invalid MAC address: expected 6 parts, got {0}")]
    InvalidLength(usize),
    #[error("invalid MAC address: part {0} has wrong length")]
    InvalidPartLength(usize),
    #[error("invalid MAC address: '{0}' is not valid hex")]
    InvalidHex(String),
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 6 {
            return Err(ParseMacError::InvalidLength(parts.len()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(ParseMacError::InvalidPartLength(i));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseMacError::InvalidHex(part.to_string()))?;
        }

        Ok(MacAddress(bytes))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let addr = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(format!("{}", addr), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_display_with_zeros() {
        let addr = MacAddress([0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(format!("{}", addr), "00:01:02:03:04:05");
    }

    #[test]
    fn test_from_le_bytes_reverses_wire_order() {
        let addr = MacAddress::from_le_bytes([0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(addr.to_le_bytes(), [0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn test_oui_prefix() {
        let addr = MacAddress([0xAC, 0xBC, 0x32, 0x01, 0x02, 0x03]);
        assert_eq!(addr.oui(), [0xAC, 0xBC, 0x32]);
    }

    #[test]
    fn test_from_str_lowercase() {
        let addr: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(addr.0, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    }

    #[test]
    fn test_from_str_invalid() {
        assert!(matches!(
            "invalid".parse::<MacAddress>(),
            Err(ParseMacError::InvalidLength(1))
        ));
        assert!(matches!(
            "AA:BB:CCC:DD:EE:F".parse::<MacAddress>(),
            Err(ParseMacError::InvalidPartLength(2))
        ));
        assert!(matches!(
            "AA:BB:CC:DD:EE:GG".parse::<MacAddress>(),
            Err(ParseMacError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_serializes_as_string() {
        let addr = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(
            serde_json::to_string(&addr).unwrap(),
            "\"AA:BB:CC:DD:EE:FF\""
        );
    }
}
