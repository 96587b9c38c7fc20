//! Core application runner for `ble-sniffer`.
//!
//! This module is decoupled from process setup (logging, exit codes) so the
//! capture loop can be tested deterministically with an injected line source
//! and an injected shutdown signal.

use crate::device::PacketFilter;
use crate::hci::frame::{DEFAULT_TAG, FrameDecoder};
use crate::mac_address::MacAddress;
use crate::output::csv::CsvExporter;
use crate::output::html::HtmlExporter;
use crate::output::json::JsonExporter;
use crate::output::pcap::PcapWriter;
use crate::output::{ExportError, Exporter, export_to_file};
use crate::session::CaptureSession;
use crate::source::{InputSource, LineSource, SourceError};
use crate::status::{StatusTicker, parse_duration};
use clap::Parser;
use log::{debug, error, info, warn};
use std::fs::File;
use std::future::Future;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Configuration for the capture run.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Serial log to read. Reads standard input when omitted.
    #[arg(short = 'i', long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Marker in front of every HCI line in the log.
    #[arg(long, default_value = DEFAULT_TAG)]
    pub tag: String,

    /// Write every captured packet to a PCAP file (Bluetooth HCI H4).
    #[arg(short = 'o', long, value_name = "PCAP")]
    pub output: Option<PathBuf>,

    /// Stream packets live into a named pipe, e.g. for Wireshark -i <PATH>.
    #[cfg(feature = "fifo")]
    #[arg(long, value_name = "PATH")]
    pub fifo: Option<PathBuf>,

    /// Export the session as JSON on exit.
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Export the device table as CSV on exit.
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Export an HTML report on exit.
    #[arg(long, value_name = "FILE")]
    pub html: Option<PathBuf>,

    /// Only keep advertisements from this address.
    /// Format: --filter-mac AA:BB:CC:DD:EE:FF
    #[arg(long, value_name = "MAC")]
    pub filter_mac: Option<MacAddress>,

    /// Only keep advertisements whose name contains this text (case-insensitive).
    #[arg(long, value_name = "TEXT")]
    pub filter_name: Option<String>,

    /// Only keep advertisements at or above this signal strength.
    #[arg(long, value_name = "DBM", allow_negative_numbers = true)]
    pub min_rssi: Option<i8>,

    /// Interval between status summaries.
    /// Accepts duration with suffix: 3s, 1m, 500ms, 2h.
    /// Without suffix, value is interpreted as seconds.
    #[arg(long, value_parser = parse_duration, default_value = "5s")]
    pub status_interval: Duration,

    /// Verbose output, log every packet and every rejected line
    #[arg(short = 'v', long = "verbose", conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Options {
    fn filter(&self) -> PacketFilter {
        PacketFilter::new(
            self.filter_mac,
            self.filter_name.as_deref(),
            self.min_rssi,
        )
    }

    fn exports(&self) -> Vec<(&'static dyn Exporter, &Path)> {
        let requested: [(&'static dyn Exporter, Option<&PathBuf>); 3] = [
            (&JsonExporter, self.json.as_ref()),
            (&CsvExporter, self.csv.as_ref()),
            (&HtmlExporter, self.html.as_ref()),
        ];
        requested
            .into_iter()
            .filter_map(|(exporter, path)| path.map(|p| (exporter, p.as_path())))
            .collect()
    }
}

/// Errors returned by the capture run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("cannot create {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn create_capture(path: &Path) -> Result<PcapWriter<BufWriter<File>>, RunError> {
    File::create(path)
        .and_then(|file| PcapWriter::new(BufWriter::new(file)))
        .map_err(|source| RunError::Create {
            path: path.to_path_buf(),
            source,
        })
}

fn log_status(session: &CaptureSession, rate: f64) {
    info!(
        "Packets: {} ({rate:.1}/s) | Bytes: {} | Devices: {} | Errors: {}",
        session.total_packets(),
        session.bytes_captured(),
        session.devices().len(),
        session.errors()
    );
}

/// Write every requested export. A failed export does not stop the others;
/// the first failure is returned.
pub fn write_exports(options: &Options, session: &CaptureSession) -> Result<(), RunError> {
    let mut failed = None;
    for (exporter, path) in options.exports() {
        match export_to_file(exporter, session, path) {
            Ok(()) => info!("{} export written to {}", exporter.name(), path.display()),
            Err(e) => {
                error!("{} export to {} failed: {e}", exporter.name(), path.display());
                failed.get_or_insert(e);
            }
        }
    }
    match failed {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Run the capture loop until the source is exhausted or `shutdown` resolves.
///
/// - Lines that are not HCI frames are skipped silently.
/// - Malformed frame lines are counted as errors and logged at debug level.
/// - Accepted frames go to the capture file and the live pipe when requested.
///
/// On exit the session is finished, a final summary is logged and each
/// requested export is written once. The finished session is returned.
pub async fn run_with_io(
    options: Options,
    source: &dyn LineSource,
    shutdown: impl Future<Output = ()>,
) -> Result<CaptureSession, RunError> {
    let decoder = FrameDecoder::new(options.tag.clone());
    let mut session = CaptureSession::new(SystemTime::now(), options.filter());

    let mut capture = options.output.as_deref().map(create_capture).transpose()?;

    #[cfg(feature = "fifo")]
    let mut live = match options.fifo.as_deref() {
        Some(path) => Some(crate::output::pcap::LiveStream::create(path).map_err(|source| {
            RunError::Create {
                path: path.to_path_buf(),
                source,
            }
        })?),
        None => None,
    };

    let mut lines = source.open().await?;
    let mut ticker = StatusTicker::new(options.status_interval);
    tokio::pin!(shutdown);

    info!("Capturing frames tagged {}", decoder.tag());

    loop {
        let line = tokio::select! {
            line = lines.recv() => match line {
                Some(line) => line,
                None => {
                    debug!("End of input");
                    break;
                }
            },
            () = &mut shutdown => {
                info!("Interrupted, finishing capture");
                break;
            }
            () = tokio::time::sleep_until(ticker.next_due().into()) => {
                if let Some(rate) = ticker.tick(session.total_packets()) {
                    log_status(&session, rate);
                }
                continue;
            }
        };

        let frame = match decoder.decode_line(&line) {
            None => continue,
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                session.record_error();
                debug!("Rejected line ({e}): {line}");
                continue;
            }
        };

        let now = SystemTime::now();
        let Some(record) = session.record_frame(&frame, now) else {
            continue;
        };
        debug!("{record}");

        if let Some(writer) = capture.as_mut()
            && let Err(e) = writer.write_packet(now, &record.raw)
        {
            error!("Capture file write failed, no more packets will be saved: {e}");
            capture = None;
        }

        #[cfg(feature = "fifo")]
        if let Some(stream) = live.as_mut() {
            stream.send(now, &record.raw);
        }
    }

    session.finish(SystemTime::now());
    let rate = session.packets_per_second();
    log_status(&session, rate);

    if let (Some(writer), Some(path)) = (&capture, &options.output) {
        info!(
            "Wrote {} packets to {}",
            writer.packets_written(),
            path.display()
        );
    }

    #[cfg(feature = "fifo")]
    if let Some(stream) = live {
        if stream.dropped() > 0 {
            warn!("Live stream dropped {} frames", stream.dropped());
        }
        let path = stream.path().to_path_buf();
        if let Err(e) = stream.close().await {
            warn!("Closing live stream {} failed: {e}", path.display());
        }
    }

    write_exports(&options, &session)?;
    Ok(session)
}

/// Run with the configured input, stopping on Ctrl-C.
pub async fn run(options: Options) -> Result<(), RunError> {
    let source = InputSource::from(options.input.clone());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    run_with_io(options, &source, shutdown).await?;
    Ok(())
}
