//! Serial transport encoding for drained advertisements.
//!
//! Each record leaves the agent as one LE Meta advertising-report line, the
//! same format the host-side [`FrameDecoder`](crate::hci::frame::FrameDecoder)
//! consumes.

use super::RecordSink;
use crate::advertisement::DecodedAdvertisement;
use crate::hci::PacketType;
use crate::hci::report::{LeAdvertisingReport, MAX_SINGLE_REPORT_DATA_LEN, encode_reports};
use std::io::{self, Write};

/// Render one advertisement as a transport line (without line ending).
///
/// AD data past [`MAX_SINGLE_REPORT_DATA_LEN`] bytes is cut off so the event
/// length still fits in one byte.
pub fn encode_line(tag: &str, record: &DecodedAdvertisement) -> String {
    let raw = record.raw();
    let data = &raw.payload[..raw.payload.len().min(MAX_SINGLE_REPORT_DATA_LEN)];
    let report = LeAdvertisingReport {
        adv_type: raw.adv_type,
        address_type: raw.address_type,
        address: raw.address,
        rssi: raw.rssi,
        data: data.to_vec(),
    };
    let payload = encode_reports(&[report]);
    format!(
        "{tag}:pkt_type=[0x{:02x}],len=[0x{:02x}],data=[{}]",
        PacketType::LeMetaEvent.code(),
        payload.len(),
        hex::encode(&payload)
    )
}

/// Writes transport lines to a byte stream, typically the serial console.
pub struct TransportWriter<W> {
    tag: String,
    out: W,
}

impl<W: Write> TransportWriter<W> {
    pub fn new(tag: impl Into<String>, out: W) -> Self {
        Self {
            tag: tag.into(),
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RecordSink for TransportWriter<W> {
    fn emit(&mut self, record: &DecodedAdvertisement) -> io::Result<()> {
        writeln!(self.out, "{}", encode_line(&self.tag, record))?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hci::frame::{DEFAULT_TAG, FrameDecoder};
    use crate::hci::report::extract;
    use crate::test_utils::{TEST_MAC, raw_advertisement};

    #[test]
    fn test_encode_line() {
        let raw = raw_advertisement(TEST_MAC, -60, &[0x02, 0x01, 0x06]);
        let record = DecodedAdvertisement::decode(raw);
        assert_eq!(
            encode_line(DEFAULT_TAG, &record),
            "[btsnoop]:pkt_type=[0x04],len=[0x0f],data=[020100\
             00ffeeddccbbaa03020106c4]"
        );
    }

    #[test]
    fn test_line_decodes_on_host() {
        let payload = [0x04, 0x09, b'T', b'a', b'g', 0x03, 0x03, 0x0F, 0x18];
        let record = DecodedAdvertisement::decode(raw_advertisement(TEST_MAC, -72, &payload));

        let frame = FrameDecoder::default()
            .parse_line(&encode_line(DEFAULT_TAG, &record))
            .unwrap();
        let event = extract(&frame).unwrap();

        assert_eq!(event.reports.len(), 1);
        let report = &event.reports[0];
        assert_eq!(report.address, TEST_MAC);
        assert_eq!(report.rssi, -72);
        assert_eq!(report.fields(), *record.fields());
    }

    #[test]
    fn test_long_payloads_fit_one_event() {
        let decoder = FrameDecoder::default();
        for len in [243, 244, 245, 250, 255] {
            // one unknown AD entry spanning the whole payload
            let mut payload = vec![(len - 1) as u8, 0xEE];
            payload.resize(len, 0x5A);
            let record = DecodedAdvertisement::decode(raw_advertisement(TEST_MAC, -60, &payload));

            let line = encode_line(DEFAULT_TAG, &record);
            let frame = decoder.parse_line(&line).unwrap();
            assert!(frame.payload.len() <= 255, "payload of {len} bytes");

            let h4 = frame.to_h4();
            assert_eq!(usize::from(h4[2]), h4.len() - 3);

            let event = extract(&frame).unwrap();
            assert_eq!(event.reports[0].data.len(), len.min(MAX_SINGLE_REPORT_DATA_LEN));
        }
    }

    #[test]
    fn test_writer_emits_one_line_per_record() {
        let mut writer = TransportWriter::new(DEFAULT_TAG, Vec::new());
        let raw = raw_advertisement(TEST_MAC, -60, &[0x02, 0x01, 0x06]);
        let record = DecodedAdvertisement::decode(raw);
        writer.emit(&record).unwrap();
        writer.emit(&record).unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with("[btsnoop]:pkt_type=[0x04]")));
    }
}
