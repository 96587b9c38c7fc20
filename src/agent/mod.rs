//! Capture agent: the embedded half of the sniffer.
//!
//! The radio driver hands every advertisement to
//! [`CaptureAgent::on_advertisement`], which decodes it and places it in a
//! bounded lossy buffer without ever waiting. A single drain task empties the
//! buffer into a [`RecordSink`] at a paced rate.

pub mod buffer;
pub mod transport;

use crate::advertisement::{AdvType, DecodedAdvertisement, RawAdvertisement};
use crate::status::StatusTicker;
use buffer::{CAPTURE_CAPACITY, SharedCaptureBuffer};
use log::info;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Pause after emitting a record.
pub const ITEM_PAUSE: Duration = Duration::from_millis(2);
/// Pause when the buffer is empty.
pub const IDLE_PAUSE: Duration = Duration::from_millis(20);
/// Interval between agent status lines.
pub const AGENT_STATUS_INTERVAL: Duration = Duration::from_secs(10);

/// First BLE advertising channel.
const FIRST_ADV_CHANNEL: u8 = 37;

/// Destination for drained records.
pub trait RecordSink: Send {
    fn emit(&mut self, record: &DecodedAdvertisement) -> io::Result<()>;
}

/// Agent counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AgentStats {
    /// Records accepted into the buffer
    pub total_packets: u64,
    pub overflow_count: u64,
    pub buffered: usize,
    pub capacity: usize,
    /// Advertisements seen by the scanner, excluding scan responses
    pub adv_count: u64,
    pub scan_rsp_count: u64,
}

#[derive(Default)]
struct Shared {
    buffer: SharedCaptureBuffer<DecodedAdvertisement, CAPTURE_CAPACITY>,
    adv_count: AtomicU64,
    scan_rsp_count: AtomicU64,
}

/// Handle to the capture buffer. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct CaptureAgent {
    shared: Arc<Shared>,
}

impl CaptureAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer entry point, callable from the radio callback.
    ///
    /// Advertisements with an empty payload are counted by the scanner
    /// counters but not buffered. A zero channel means the controller did not
    /// report one; it is replaced by a rotation over channels 37 to 39.
    pub fn on_advertisement(&self, mut raw: RawAdvertisement) {
        let adv_count = if raw.adv_type == AdvType::ScanRsp {
            self.shared.scan_rsp_count.fetch_add(1, Ordering::Relaxed);
            self.shared.adv_count.load(Ordering::Relaxed)
        } else {
            self.shared.adv_count.fetch_add(1, Ordering::Relaxed) + 1
        };

        if raw.payload.is_empty() {
            return;
        }
        if raw.channel == 0 {
            raw.channel = FIRST_ADV_CHANNEL + (adv_count % 3) as u8;
        }

        self.shared.buffer.enqueue(DecodedAdvertisement::decode(raw));
    }

    pub fn stats(&self) -> AgentStats {
        let buffer = self.shared.buffer.stats();
        AgentStats {
            total_packets: buffer.packet_count,
            overflow_count: buffer.overflow_count,
            buffered: buffer.buffered,
            capacity: buffer.capacity,
            adv_count: self.shared.adv_count.load(Ordering::Relaxed),
            scan_rsp_count: self.shared.scan_rsp_count.load(Ordering::Relaxed),
        }
    }

    /// Forward advertisements from a radio channel into the buffer until the
    /// sending side closes.
    pub fn spawn_radio_bridge(
        &self,
        mut radio: mpsc::Receiver<RawAdvertisement>,
    ) -> JoinHandle<()> {
        let agent = self.clone();
        tokio::spawn(async move {
            while let Some(raw) = radio.recv().await {
                agent.on_advertisement(raw);
            }
        })
    }

    /// Drain the buffer into `sink` until `shutdown` turns true or its sender
    /// is dropped. Records still buffered at shutdown are emitted before
    /// returning.
    pub async fn drain(
        &self,
        sink: &mut dyn RecordSink,
        mut shutdown: watch::Receiver<bool>,
    ) -> io::Result<()> {
        info!("Capture agent draining (buffer: {CAPTURE_CAPACITY})");
        let mut ticker = StatusTicker::new(AGENT_STATUS_INTERVAL);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pause = match self.shared.buffer.dequeue() {
                Some(record) => {
                    sink.emit(&record)?;
                    ITEM_PAUSE
                }
                None => IDLE_PAUSE,
            };

            let stats = self.stats();
            if let Some(rate) = ticker.tick(stats.total_packets) {
                info!(
                    "Total={} Rate={:.0}/s Overflow={} Buffer={}/{}",
                    stats.total_packets, rate, stats.overflow_count, stats.buffered, stats.capacity
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        while let Some(record) = self.shared.buffer.dequeue() {
            sink.emit(&record)?;
        }
        let stats = self.stats();
        info!(
            "Capture agent stopped - ADV:{} SCAN_RSP:{} Overflow={}",
            stats.adv_count, stats.scan_rsp_count, stats.overflow_count
        );
        Ok(())
    }
}
