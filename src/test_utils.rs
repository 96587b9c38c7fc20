use crate::advertisement::{AddressType, AdvType, DecodedAdvertisement, RawAdvertisement};
use crate::agent::transport::encode_line;
use crate::device::PacketFilter;
use crate::hci::frame::{DEFAULT_TAG, FrameDecoder};
use crate::hci::{HciFrame, PacketType};
use crate::mac_address::MacAddress;
use crate::session::CaptureSession;
use std::time::{Duration, SystemTime};

/// A stable MAC address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Start time of [`sample_session`].
pub const SAMPLE_START_SECS: u64 = 1_700_000_000;

/// Build an `ADV_IND` from a public address on channel 37.
pub fn raw_advertisement(mac: MacAddress, rssi: i8, payload: &[u8]) -> RawAdvertisement {
    RawAdvertisement::new(
        mac,
        rssi,
        37,
        0,
        AdvType::AdvInd,
        AddressType::Public,
        payload,
    )
}

/// Transport line carrying one advertising report.
pub fn advertising_line(mac: MacAddress, rssi: i8, payload: &[u8]) -> String {
    encode_line(
        DEFAULT_TAG,
        &DecodedAdvertisement::decode(raw_advertisement(mac, rssi, payload)),
    )
}

/// AD payload with a complete local name.
pub fn name_payload(name: &str) -> Vec<u8> {
    let mut payload = vec![name.len() as u8 + 1, 0x09];
    payload.extend_from_slice(name.as_bytes());
    payload
}

/// A small finished session: three devices, one command, one bad line.
///
/// `TEST_MAC` is seen twice (-50 and -70 dBm) with a name, the battery
/// service and Apple manufacturer data.
pub fn sample_session() -> CaptureSession {
    let start = SystemTime::UNIX_EPOCH + Duration::from_secs(SAMPLE_START_SECS);
    let mut session = CaptureSession::new(start, PacketFilter::default());
    let decoder = FrameDecoder::default();

    let mut sensor = name_payload("Sensor, \"A\"");
    sensor.extend_from_slice(&[0x03, 0x03, 0x0F, 0x18]);
    sensor.extend_from_slice(&[0x05, 0xFF, 0x4C, 0x00, 0x02, 0x15]);

    let tag: MacAddress = "11:22:33:44:55:66".parse().unwrap_or_default();
    let anonymous: MacAddress = "C0:FF:EE:00:00:01".parse().unwrap_or_default();

    let lines = [
        advertising_line(TEST_MAC, -50, &sensor),
        advertising_line(tag, -65, &name_payload("<b>Tag</b>")),
        advertising_line(TEST_MAC, -70, &[0x02, 0x01, 0x06]),
        advertising_line(anonymous, -90, &[0x02, 0x01, 0x06]),
    ];

    for (i, line) in lines.iter().enumerate() {
        let frame = decoder
            .parse_line(line)
            .unwrap_or_else(|e| panic!("bad fixture line {line}: {e}"));
        session.record_frame(&frame, start + Duration::from_secs(i as u64 + 1));
    }
    session.record_frame(
        &HciFrame::new(PacketType::Command, vec![0x0C, 0x20, 0x02, 0x01, 0x00]),
        start + Duration::from_secs(5),
    );
    session.record_error();
    session.finish(start + Duration::from_secs(10));
    session
}
