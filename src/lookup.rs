//! Read-only name tables for codes seen in advertisements and HCI traffic.
//!
//! Each lookup returns `None` for unknown codes; the `*_or_hex` helpers give
//! the display form used in exports.

use crate::mac_address::MacAddress;

/// Bluetooth SIG company identifier.
pub fn company_name(id: u16) -> Option<&'static str> {
    Some(match id {
        0x0006 => "Microsoft",
        0x004C => "Apple",
        0x0075 => "Samsung",
        0x0087 => "Garmin",
        0x00D2 | 0x00E0 => "Google",
        0x0157 => "Polar",
        0x01D2 | 0x038F => "Xiaomi",
        0x0310 => "Amazfit",
        0x0822 => "adidas",
        0x09A8 => "Shenzhen",
        _ => return None,
    })
}

/// 16-bit GATT service UUID.
pub fn service_name(uuid: u16) -> Option<&'static str> {
    Some(match uuid {
        0x1800 => "Generic Access",
        0x1801 => "Generic Attribute",
        0x1802 => "Immediate Alert",
        0x1803 => "Link Loss",
        0x1804 => "Tx Power",
        0x1805 => "Current Time",
        0x1806 => "Reference Time Update",
        0x1807 => "Next DST Change",
        0x1808 => "Glucose",
        0x1809 => "Health Thermometer",
        0x180A => "Device Information",
        0x180D => "Heart Rate",
        0x180E => "Phone Alert Status",
        0x180F => "Battery",
        0x1810 => "Blood Pressure",
        0x1811 => "Alert Notification",
        0x1812 => "Human Interface Device",
        0x1813 => "Scan Parameters",
        0x1814 => "Running Speed and Cadence",
        0x1815 => "Automation IO",
        0x1816 => "Cycling Speed and Cadence",
        0x1818 => "Cycling Power",
        0x1819 => "Location and Navigation",
        0x181A => "Environmental Sensing",
        0x181B => "Body Composition",
        0x181C => "User Data",
        0x181D => "Weight Scale",
        0x181E => "Bond Management",
        0x181F => "Continuous Glucose Monitoring",
        0x1820 => "Internet Protocol Support",
        0x1821 => "Indoor Positioning",
        0x1822 => "Pulse Oximeter",
        0x1823 => "HTTP Proxy",
        0x1824 => "Transport Discovery",
        0x1825 => "Object Transfer",
        0x1826 => "Fitness Machine",
        0x1827 => "Mesh Provisioning",
        0x1828 => "Mesh Proxy",
        0xFE9F => "Google",
        0xFEAA => "Google Eddystone",
        0xFD6F => "Apple Exposure Notification",
        _ => return None,
    })
}

/// GAP appearance value.
pub fn appearance_name(code: u16) -> Option<&'static str> {
    Some(match code {
        0x0000 => "Unknown",
        0x0040 => "Generic Phone",
        0x0080 => "Generic Computer",
        0x00C0 => "Generic Watch",
        0x00C1 => "Sports Watch",
        0x0100 => "Generic Clock",
        0x0140 => "Generic Display",
        0x0180 => "Generic Remote Control",
        0x01C0 => "Generic Eye-glasses",
        0x0200 => "Generic Tag",
        0x0240 => "Generic Keyring",
        0x0280 => "Generic Media Player",
        0x02C0 => "Generic Barcode Scanner",
        0x0300 => "Generic Thermometer",
        0x0340 => "Generic Heart Rate Sensor",
        0x0380 => "Generic Blood Pressure",
        0x03C0 => "Generic HID",
        0x03C1 => "Keyboard",
        0x03C2 => "Mouse",
        0x03C3 => "Joystick",
        0x03C4 => "Gamepad",
        0x0440 => "Generic Glucose Meter",
        0x0480 => "Generic Running/Walking Sensor",
        0x04C0 => "Generic Cycling",
        0x0540 => "Generic Pulse Oximeter",
        0x0580 => "Generic Weight Scale",
        0x05C0 => "Generic Outdoor Sports",
        _ => return None,
    })
}

/// HCI event code.
pub fn event_name(code: u8) -> Option<&'static str> {
    Some(match code {
        0x05 => "Disconnection Complete",
        0x08 => "Encryption Change",
        0x0C => "Read Remote Version Complete",
        0x0E => "Command Complete",
        0x0F => "Command Status",
        0x10 => "Hardware Error",
        0x13 => "Number of Completed Packets",
        0x3E => "LE Meta Event",
        _ => return None,
    })
}

/// LE Meta sub-event code.
pub fn le_subevent_name(code: u8) -> Option<&'static str> {
    Some(match code {
        0x01 => "LE Connection Complete",
        0x02 => "LE Advertising Report",
        0x03 => "LE Connection Update Complete",
        0x04 => "LE Read Remote Features Complete",
        0x05 => "LE Long Term Key Request",
        0x06 => "LE Remote Connection Parameter Request",
        0x07 => "LE Data Length Change",
        0x0A => "LE Enhanced Connection Complete",
        0x0D => "LE Extended Advertising Report",
        _ => return None,
    })
}

/// Command opcode group.
pub fn ogf_name(ogf: u8) -> Option<&'static str> {
    Some(match ogf {
        0x01 => "Link Control",
        0x02 => "Link Policy",
        0x03 => "Controller & Baseband",
        0x04 => "Informational",
        0x05 => "Status",
        0x08 => "LE Controller",
        _ => return None,
    })
}

/// Vendor registered for the address prefix.
///
/// Only meaningful for public addresses; random addresses usually resolve to
/// nothing.
pub fn oui_vendor(address: &MacAddress) -> Option<&'static str> {
    Some(match address.oui() {
        [0x00, 0x1C, 0xB3]
        | [0x00, 0x03, 0x93]
        | [0x00, 0x0A, 0x95]
        | [0x28, 0xCF, 0xDA]
        | [0x34, 0xC0, 0x59]
        | [0x3C, 0x07, 0x54]
        | [0x78, 0x31, 0xC1]
        | [0xA4, 0xB1, 0x97]
        | [0xAC, 0xBC, 0x32]
        | [0xF0, 0xB4, 0x79] => "Apple",
        [0x00, 0x12, 0x47]
        | [0x00, 0x15, 0x99]
        | [0x50, 0x01, 0xBB]
        | [0x5C, 0x0A, 0x5B]
        | [0x8C, 0x77, 0x12]
        | [0xAC, 0x5F, 0x3E]
        | [0xE4, 0x7C, 0xF9] => "Samsung",
        [0x00, 0x1A, 0x11] | [0x3C, 0x5A, 0xB4] | [0x54, 0x60, 0x09] | [0xF4, 0xF5, 0xD8] => {
            "Google"
        }
        [0x00, 0x0D, 0x3A] | [0x00, 0x15, 0x5D] | [0x00, 0x50, 0xF2] | [0x7C, 0x1E, 0x52] => {
            "Microsoft"
        }
        [0x0C, 0x47, 0xC9] | [0x44, 0x65, 0x0D] | [0x68, 0x37, 0xE9] | [0xFC, 0x65, 0xDE] => {
            "Amazon"
        }
        [0x04, 0xCF, 0x8C] | [0x28, 0x6C, 0x07] | [0x64, 0x09, 0x80] | [0xF8, 0xA4, 0x5F] => {
            "Xiaomi"
        }
        [0x24, 0x0A, 0xC4]
        | [0x24, 0x6F, 0x28]
        | [0x30, 0xAE, 0xA4]
        | [0x3C, 0x71, 0xBF]
        | [0x7C, 0x9E, 0xBD]
        | [0x84, 0xF3, 0xEB]
        | [0xA4, 0xCF, 0x12]
        | [0xC4, 0x4F, 0x33] => "Espressif",
        [0xC0, 0xA5, 0xE3] | [0xD4, 0xCA, 0x6E] | [0xF0, 0x5C, 0xD5] => "Nordic",
        [0x18, 0xB9, 0x05] => "Bouffalo Lab",
        [0x00, 0x12, 0x37] | [0x04, 0xA3, 0x16] | [0x34, 0x03, 0xDE] | [0xB0, 0xB4, 0x48] => {
            "Texas Instruments"
        }
        [0x50, 0xA4, 0xD0] | [0xC0, 0xD0, 0x12] => "Fitbit",
        [0xE4, 0xF0, 0x42] | [0xD0, 0x03, 0x4B] => "Tile",
        _ => return None,
    })
}

pub fn service_name_or_hex(uuid: u16) -> String {
    service_name(uuid).map_or_else(|| format!("0x{uuid:04X}"), str::to_string)
}

pub fn appearance_name_or_hex(code: u16) -> String {
    appearance_name(code).map_or_else(|| format!("0x{code:04X}"), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(company_name(0x004C), Some("Apple"));
        assert_eq!(company_name(0x00E0), Some("Google"));
        assert_eq!(service_name(0x180F), Some("Battery"));
        assert_eq!(appearance_name(0x03C2), Some("Mouse"));
        assert_eq!(event_name(0x0E), Some("Command Complete"));
        assert_eq!(le_subevent_name(0x02), Some("LE Advertising Report"));
        assert_eq!(ogf_name(0x08), Some("LE Controller"));
    }

    #[test]
    fn test_unknown_codes_fall_back_to_hex() {
        assert_eq!(company_name(0xFFFF), None);
        assert_eq!(service_name_or_hex(0xABCD), "0xABCD");
        assert_eq!(appearance_name_or_hex(0x0041), "0x0041");
        assert_eq!(service_name_or_hex(0x180D), "Heart Rate");
    }

    #[test]
    fn test_oui_vendor() {
        let apple: MacAddress = "00:1C:B3:12:34:56".parse().unwrap();
        let tile: MacAddress = "E4:F0:42:00:00:01".parse().unwrap();
        let random: MacAddress = "C1:22:33:44:55:66".parse().unwrap();
        assert_eq!(oui_vendor(&apple), Some("Apple"));
        assert_eq!(oui_vendor(&tile), Some("Tile"));
        assert_eq!(oui_vendor(&random), None);
    }
}
