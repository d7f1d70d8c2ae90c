//! # Background Reader
//!
//! Pulls bytes from the serial receive half, feeds the frame decoder and
//! publishes decoded snapshots.
//!
//! Error policy:
//! - `Ok(0)` from the port means it was closed: fatal.
//! - `NotFound`, `PermissionDenied`, `BrokenPipe`, `NotConnected` and
//!   `UnexpectedEof` mean the device is gone: fatal.
//! - `Interrupted` is retried at once; `WouldBlock` and `TimedOut` are
//!   retried after `retry_interval`. Neither ever ends the reader.
//! - Anything else is retried after `retry_interval`, up to
//!   `max_consecutive_errors` failures in a row.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, trace, warn};

use crate::config::SerialConfig;
use crate::crsf::decoder::{dispatch, DecoderStats, FrameDecoder};
use crate::error::{CrsfError, Result};
use crate::serial::SerialRx;
use crate::store::SnapshotStore;

/// Tuning for the reader loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSettings {
    /// Bytes requested per read
    pub buffer_size: usize,
    /// Pause after a failed read
    pub retry_interval: Duration,
    /// Consecutive failed reads before giving up
    pub max_consecutive_errors: u32,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self::from(&SerialConfig::default())
    }
}

impl From<&SerialConfig> for ReaderSettings {
    fn from(config: &SerialConfig) -> Self {
        Self {
            buffer_size: config.read_buffer_size.max(1),
            retry_interval: config.read_retry_interval(),
            max_consecutive_errors: config.max_read_errors.max(1),
        }
    }
}

fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(kind, io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn is_fatal(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::NotFound
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

/// Run the reader until shutdown is requested or the port fails for good
///
/// Returns the decoder counters on a requested shutdown.
///
/// # Errors
///
/// Returns [`CrsfError::Serial`] when the port closes, reports a fatal
/// error, or fails `max_consecutive_errors` times in a row.
pub async fn run_reader<R>(
    mut rx: R,
    store: Arc<SnapshotStore>,
    settings: ReaderSettings,
    mut shutdown: watch::Receiver<bool>,
) -> Result<DecoderStats>
where
    R: SerialRx,
{
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; settings.buffer_size.max(1)];
    let mut consecutive_errors: u32 = 0;

    info!("CRSF reader started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let result = tokio::select! {
            result = rx.read(&mut buf) => result,
            changed = shutdown.changed() => {
                // A dropped sender also ends the reader
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        };

        match result {
            Ok(0) => {
                return Err(fail(&decoder, "serial port closed".to_string()));
            }
            Ok(n) => {
                consecutive_errors = 0;
                decoder.feed(&buf[..n], |frame| {
                    dispatch(&frame, &store);
                });
            }
            Err(e) if is_fatal(e.kind()) => {
                return Err(fail(&decoder, format!("serial read failed: {}", e)));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                trace!("Serial read interrupted, retrying");
            }
            Err(e) if is_transient(e.kind()) => {
                // No data yet; never counts toward giving up
                trace!("Serial read not ready: {}", e);
                tokio::time::sleep(settings.retry_interval).await;
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors >= settings.max_consecutive_errors {
                    return Err(fail(
                        &decoder,
                        format!("{} consecutive read errors, last: {}", consecutive_errors, e),
                    ));
                }

                warn!(
                    "Serial read error ({}/{}): {}",
                    consecutive_errors, settings.max_consecutive_errors, e
                );
                tokio::time::sleep(settings.retry_interval).await;
            }
        }
    }

    let stats = decoder.stats();
    info!("CRSF reader stopped: {:?}", stats);
    Ok(stats)
}

fn fail(decoder: &FrameDecoder, reason: String) -> CrsfError {
    error!("CRSF reader terminated: {} ({:?})", reason, decoder.stats());
    CrsfError::Serial(reason)
}
