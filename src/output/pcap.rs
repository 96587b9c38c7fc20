//! PCAP capture files and the live named-pipe stream.
//!
//! Records use link type 187 (Bluetooth HCI H4), so every packet is the
//! reconstructed H4 packet from [`HciFrame::to_h4`](crate::hci::HciFrame::to_h4).

use std::io::{self, Write};
use std::time::SystemTime;

pub const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
pub const PCAP_VERSION_MAJOR: u16 = 2;
pub const PCAP_VERSION_MINOR: u16 = 4;
pub const PCAP_SNAPLEN: u32 = 65_535;
pub const LINKTYPE_BLUETOOTH_HCI_H4: u32 = 187;

/// Size of the file header.
pub const GLOBAL_HEADER_LEN: usize = 24;
/// Size of each record header.
pub const RECORD_HEADER_LEN: usize = 16;

pub fn global_header() -> [u8; GLOBAL_HEADER_LEN] {
    let mut header = [0u8; GLOBAL_HEADER_LEN];
    header[0..4].copy_from_slice(&PCAP_MAGIC.to_le_bytes());
    header[4..6].copy_from_slice(&PCAP_VERSION_MAJOR.to_le_bytes());
    header[6..8].copy_from_slice(&PCAP_VERSION_MINOR.to_le_bytes());
    // thiszone and sigfigs stay zero
    header[16..20].copy_from_slice(&PCAP_SNAPLEN.to_le_bytes());
    header[20..24].copy_from_slice(&LINKTYPE_BLUETOOTH_HCI_H4.to_le_bytes());
    header
}

pub fn record_header(timestamp: SystemTime, len: usize) -> [u8; RECORD_HEADER_LEN] {
    let since_epoch = timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = since_epoch.as_secs() as u32;
    let usecs = since_epoch.subsec_micros();
    let len = len as u32;

    let mut header = [0u8; RECORD_HEADER_LEN];
    header[0..4].copy_from_slice(&secs.to_le_bytes());
    header[4..8].copy_from_slice(&usecs.to_le_bytes());
    header[8..12].copy_from_slice(&len.to_le_bytes());
    header[12..16].copy_from_slice(&len.to_le_bytes());
    header
}

/// Incremental PCAP writer. Every write is flushed so a reader sees packets
/// as soon as they are captured.
#[derive(Debug)]
pub struct PcapWriter<W: Write> {
    out: W,
    packets: u64,
}

impl<W: Write> PcapWriter<W> {
    /// Write the file header and return the writer.
    pub fn new(mut out: W) -> io::Result<Self> {
        out.write_all(&global_header())?;
        out.flush()?;
        Ok(Self { out, packets: 0 })
    }

    pub fn write_packet(&mut self, timestamp: SystemTime, packet: &[u8]) -> io::Result<()> {
        self.out.write_all(&record_header(timestamp, packet.len()))?;
        self.out.write_all(packet)?;
        self.out.flush()?;
        self.packets += 1;
        Ok(())
    }

    pub fn packets_written(&self) -> u64 {
        self.packets
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(feature = "fifo")]
pub use live::LiveStream;

#[cfg(feature = "fifo")]
mod live {
    use super::PcapWriter;
    use log::{info, warn};
    use std::ffi::CString;
    use std::fs::OpenOptions;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::OpenOptionsExt;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, SystemTime};
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::error::TrySendError;
    use tokio::task::JoinHandle;

    /// Frames queued for the pipe writer before new ones are dropped.
    pub const LIVE_QUEUE_CAPACITY: usize = 256;
    /// How long shutdown waits for a slow reader to take queued frames.
    const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

    type Frame = (SystemTime, Vec<u8>);

    /// PCAP stream into a named pipe, for live viewing in a packet analyzer.
    ///
    /// Opening a pipe for writing blocks until a reader attaches, and writes
    /// block while the reader is slow. Both happen on a blocking thread fed by
    /// a bounded queue, so capture never waits on the reader.
    pub struct LiveStream {
        path: PathBuf,
        tx: Option<mpsc::Sender<Frame>>,
        task: JoinHandle<io::Result<()>>,
        attached: Arc<AtomicBool>,
        cancelled: Arc<AtomicBool>,
        dropped: u64,
    }

    impl LiveStream {
        /// Create the pipe at `path`, replacing any existing file, and start
        /// the writer thread.
        pub fn create(path: &Path) -> io::Result<Self> {
            make_fifo(path)?;

            let (tx, mut rx) = mpsc::channel::<Frame>(LIVE_QUEUE_CAPACITY);
            let attached = Arc::new(AtomicBool::new(false));
            let cancelled = Arc::new(AtomicBool::new(false));
            let task = {
                let path = path.to_path_buf();
                let attached = Arc::clone(&attached);
                let cancelled = Arc::clone(&cancelled);
                tokio::task::spawn_blocking(move || {
                    info!("Waiting for a reader on {}", path.display());
                    let pipe = OpenOptions::new().write(true).open(&path)?;
                    if cancelled.load(Ordering::Acquire) {
                        return Ok(());
                    }
                    attached.store(true, Ordering::Release);
                    info!("Live reader attached to {}", path.display());

                    let mut writer = PcapWriter::new(pipe)?;
                    while let Some((timestamp, packet)) = rx.blocking_recv() {
                        match writer.write_packet(timestamp, &packet) {
                            Ok(()) => {}
                            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                                warn!("Live reader on {} went away", path.display());
                                return Ok(());
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    Ok(())
                })
            };

            Ok(LiveStream {
                path: path.to_path_buf(),
                tx: Some(tx),
                task,
                attached,
                cancelled,
                dropped: 0,
            })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        /// Queue one packet. Returns `false` when it was dropped because the
        /// writer is behind or has stopped.
        pub fn send(&mut self, timestamp: SystemTime, packet: &[u8]) -> bool {
            let Some(tx) = &self.tx else {
                return false;
            };
            match tx.try_send((timestamp, packet.to_vec())) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.dropped += 1;
                    if self.dropped.is_power_of_two() {
                        warn!("Live stream behind, {} frames dropped", self.dropped);
                    }
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    self.tx = None;
                    false
                }
            }
        }

        pub fn dropped(&self) -> u64 {
            self.dropped
        }

        /// Whether a reader has opened the pipe.
        pub fn is_attached(&self) -> bool {
            self.attached.load(Ordering::Acquire)
        }

        /// Stop the writer and remove the pipe.
        pub async fn close(mut self) -> io::Result<()> {
            self.tx = None;

            // A writer still blocked in open() is released by opening the read
            // end ourselves.
            let _unblock = if self.is_attached() {
                None
            } else {
                self.cancelled.store(true, Ordering::Release);
                OpenOptions::new()
                    .read(true)
                    .custom_flags(libc::O_NONBLOCK)
                    .open(&self.path)
                    .ok()
            };

            match tokio::time::timeout(CLOSE_TIMEOUT, &mut self.task).await {
                Ok(result) => result.map_err(io::Error::other)??,
                Err(_) => warn!("Live stream writer did not stop in time"),
            }

            std::fs::remove_file(&self.path)
        }
    }

    fn make_fifo(path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: c_path is a valid NUL-terminated string for the whole call.
        let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

}
