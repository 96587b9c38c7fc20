//! LE Advertising Report extraction.
//!
//! An LE Meta frame payload starts at the sub-event code (the event code is
//! implied by the packet type). For sub-event 0x02 the layout is:
//!
//! ```text
//! subevent | num_reports | { adv_type | addr_type | addr[6] (LSB first) | len | ad[len] | rssi }*
//! ```

use super::{HciFrame, LE_ADVERTISING_REPORT, PacketType};
use crate::advertisement::{AdFields, AddressType, AdvType};
use crate::mac_address::MacAddress;
use thiserror::Error;

/// Bytes preceding the AD data in each report.
const REPORT_HEADER_LEN: usize = 9;

/// Most AD bytes a single-report advertising event can carry: the event
/// length byte covers the sub-event code, report count, report header and
/// trailing RSSI as well.
pub const MAX_SINGLE_REPORT_DATA_LEN: usize = u8::MAX as usize - 2 - REPORT_HEADER_LEN - 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("expected an LE meta event, got {0}")]
    NotLeMeta(PacketType),
    #[error("event truncated before the {0}")]
    Truncated(&'static str),
    #[error("report {index} declares {declared} data bytes but only {remaining} remain")]
    ReportOverrun {
        index: usize,
        declared: usize,
        remaining: usize,
    },
}

/// One advertisement observed by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeAdvertisingReport {
    pub adv_type: AdvType,
    pub address_type: AddressType,
    pub address: MacAddress,
    pub rssi: i8,
    pub data: Vec<u8>,
}

impl LeAdvertisingReport {
    pub fn fields(&self) -> AdFields {
        AdFields::parse(&self.data)
    }
}

/// Result of interpreting one LE Meta frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeMetaEvent {
    pub subevent: u8,
    /// Reports decoded before any error; empty for other sub-events.
    pub reports: Vec<LeAdvertisingReport>,
    /// Set when a report did not fit the frame. Reports after it are lost.
    pub error: Option<ExtractError>,
}

/// Interpret an LE Meta frame.
///
/// Frames of other types are rejected with [`ExtractError::NotLeMeta`].
/// Sub-events other than the advertising report yield an event with no
/// reports. A report that runs past the end of the frame ends extraction
/// and is recorded in [`LeMetaEvent::error`], keeping earlier reports.
pub fn extract(frame: &HciFrame) -> Result<LeMetaEvent, ExtractError> {
    if frame.packet_type != PacketType::LeMetaEvent {
        return Err(ExtractError::NotLeMeta(frame.packet_type));
    }

    let (&subevent, body) = frame
        .payload
        .split_first()
        .ok_or(ExtractError::Truncated("sub-event code"))?;

    let mut event = LeMetaEvent {
        subevent,
        reports: Vec::new(),
        error: None,
    };
    if subevent != LE_ADVERTISING_REPORT {
        return Ok(event);
    }

    let (&count, mut rest) = body
        .split_first()
        .ok_or(ExtractError::Truncated("report count"))?;

    for index in 0..usize::from(count) {
        match next_report(index, rest) {
            Ok((report, tail)) => {
                event.reports.push(report);
                rest = tail;
            }
            Err(e) => {
                event.error = Some(e);
                break;
            }
        }
    }

    Ok(event)
}

fn next_report(index: usize, bytes: &[u8]) -> Result<(LeAdvertisingReport, &[u8]), ExtractError> {
    let [adv_type, address_type, a0, a1, a2, a3, a4, a5, len, rest @ ..] = bytes else {
        return Err(ExtractError::Truncated("report header"));
    };

    let declared = usize::from(*len);
    // AD bytes plus the trailing RSSI byte
    if rest.len() < declared + 1 {
        return Err(ExtractError::ReportOverrun {
            index,
            declared,
            remaining: rest.len(),
        });
    }
    let (data, tail) = rest.split_at(declared);

    let report = LeAdvertisingReport {
        adv_type: AdvType::from_code(*adv_type),
        address_type: AddressType::from_code(*address_type),
        address: MacAddress::from_le_bytes([*a0, *a1, *a2, *a3, *a4, *a5]),
        rssi: tail[0] as i8,
        data: data.to_vec(),
    };
    Ok((report, &tail[1..]))
}

/// Encode reports as an LE Meta frame payload (the inverse of [`extract`]).
pub fn encode_reports(reports: &[LeAdvertisingReport]) -> Vec<u8> {
    let mut payload = vec![LE_ADVERTISING_REPORT, reports.len() as u8];
    for report in reports {
        payload.push(report.adv_type.code());
        payload.push(report.address_type.code());
        payload.extend_from_slice(&report.address.to_le_bytes());
        payload.push(report.data.len() as u8);
        payload.extend_from_slice(&report.data);
        payload.push(report.rssi as u8);
    }
    payload
}
