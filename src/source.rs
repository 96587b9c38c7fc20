//! Input sources for the host run loop.
//!
//! A source turns a byte stream (a serial log on stdin or a saved file) into
//! a channel of text lines. The run loop only sees the channel, so tests can
//! inject lines without touching the file system.

use log::{debug, warn};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Channel buffer size for input lines.
pub const LINE_CHANNEL_BUFFER_SIZE: usize = 1024;

/// Error type for opening an input source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("cannot open input {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Line source abstraction to enable deterministic unit tests without a
/// serial port.
pub trait LineSource: Send + Sync {
    fn open(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<String>, SourceError>> + Send + '_>>;
}

/// Reads lines from a file, or from standard input when no path is given.
#[derive(Debug, Default, Clone)]
pub struct InputSource {
    path: Option<PathBuf>,
}

impl InputSource {
    pub fn stdin() -> Self {
        InputSource { path: None }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        InputSource {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl From<Option<PathBuf>> for InputSource {
    fn from(path: Option<PathBuf>) -> Self {
        InputSource { path }
    }
}

impl LineSource for InputSource {
    fn open(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<String>, SourceError>> + Send + '_>>
    {
        Box::pin(async move {
            match &self.path {
                Some(path) => {
                    let file =
                        tokio::fs::File::open(path)
                            .await
                            .map_err(|source| SourceError::Open {
                                path: path.clone(),
                                source,
                            })?;
                    debug!("Reading frames from {}", path.display());
                    Ok(spawn_line_reader(file))
                }
                None => {
                    debug!("Reading frames from standard input");
                    Ok(spawn_line_reader(tokio::io::stdin()))
                }
            }
        })
    }
}

/// Split `reader` into lines on a background task.
///
/// Invalid UTF-8 is replaced rather than rejected, since serial logs routinely
/// contain line noise. The channel closes at end of input or on a read error.
pub fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_CHANNEL_BUFFER_SIZE);

    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\r', '\n']).to_string();
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Input read failed: {e}");
                    break;
                }
            }
        }
        debug!("Input closed");
    });

    rx
}
