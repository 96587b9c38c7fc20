//! `ble-sniffer` library.
//!
//! Two halves share the advertisement model:
//!
//! - the capture agent ([`agent`]) buffers decoded advertisements from a radio
//!   callback and writes them out as transport lines;
//! - the host side parses those lines back into HCI frames ([`hci`]),
//!   aggregates devices ([`session`], [`device`]) and exports the result
//!   ([`output`]).
//!
//! The binary (`src/main.rs`) is responsible for logging setup and process
//! exit codes. The capture loop lives in [`crate::app`] where it can be tested
//! deterministically with an injected line source.

pub mod advertisement;
pub mod agent;
pub mod app;
pub mod device;
pub mod hci;
pub mod lookup;
pub mod mac_address;
pub mod output;
pub mod session;
pub mod source;
pub mod status;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types at the crate root
pub use advertisement::{AdFields, AddressType, AdvType, DecodedAdvertisement, RawAdvertisement};
pub use agent::CaptureAgent;
pub use agent::buffer::{CaptureBuffer, SharedCaptureBuffer};
pub use device::{DeviceAggregator, DeviceRecord, PacketFilter};
pub use hci::frame::{FrameDecoder, FrameError};
pub use hci::report::{ExtractError, LeAdvertisingReport};
pub use hci::{HciFrame, PacketType};
pub use mac_address::MacAddress;
pub use output::{ExportError, Exporter};
pub use session::CaptureSession;
pub use source::{InputSource, LineSource, SourceError};
pub use status::parse_duration;
