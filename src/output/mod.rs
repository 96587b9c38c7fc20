//! Exporters for a finished capture session.
//!
//! The report formats (JSON, CSV, HTML) implement [`Exporter`] and render the
//! whole session at once. Capture files are written incrementally by
//! [`pcap::PcapWriter`] while the capture runs.

pub mod csv;
pub mod html;
pub mod json;
pub mod pcap;

use crate::session::CaptureSession;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] ::csv::Error),
}

/// Renders a capture session into one output document.
///
/// Exporters only read the session.
pub trait Exporter: Send + Sync {
    /// Short format name used in log messages.
    fn name(&self) -> &'static str;

    fn export(&self, session: &CaptureSession, out: &mut dyn Write) -> Result<(), ExportError>;
}

/// Export `session` into a newly created file at `path`.
pub fn export_to_file(
    exporter: &dyn Exporter,
    session: &CaptureSession,
    path: &Path,
) -> Result<(), ExportError> {
    let mut out = BufWriter::new(File::create(path)?);
    exporter.export(session, &mut out)?;
    out.flush()?;
    Ok(())
}

pub(crate) fn rfc3339(t: SystemTime) -> String {
    OffsetDateTime::from(t).format(&Rfc3339).unwrap_or_default()
}

pub(crate) fn date_time(t: SystemTime) -> String {
    OffsetDateTime::from(t)
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_default()
}

pub(crate) fn time_of_day(t: SystemTime) -> String {
    OffsetDateTime::from(t)
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}
