//! # CRSF Link
//!
//! Receives RC channels and link statistics from a CRSF receiver and
//! reports the link state.
//!
//! ## Usage
//!
//! ```bash
//! crsf-link [config/default.toml]
//! ```
//!
//! Expected output:
//! ```text
//! INFO crsf_link: CRSF Link v0.1.0 starting...
//! INFO crsf_link::serial: Opened CRSF serial port /dev/ttyUSB0
//! INFO crsf_link: Channels [992, 992, 172, 992, ...] (age 4ms)
//! INFO crsf_link: Link LQ 100% RSSI -42dBm SNR 9dB
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crsf_link::config::{Config, LoggingConfig};
use crsf_link::link::CrsfLink;
use crsf_link::store::SnapshotStore;
use crsf_link::telemetry::{TelemetryLogger, TelemetryRecord};

/// Used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix for rolling diagnostic logs
const LOG_FILE_PREFIX: &str = "crsf-link.log";

/// Freshness of the channel snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    /// No channels frame received yet
    Waiting,
    Healthy,
    /// Last channels frame is older than the failsafe timeout
    Lost,
}

fn link_state(store: &SnapshotStore, failsafe_timeout: Duration) -> LinkState {
    match store.channels_age() {
        None => LinkState::Waiting,
        Some(age) if age > failsafe_timeout => LinkState::Lost,
        Some(_) => LinkState::Healthy,
    }
}

/// Install the console layer and, when configured, a daily rolling file
///
/// `RUST_LOG` overrides the configured level. The returned guard must be
/// held until exit so buffered file output is written.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn report(store: &SnapshotStore, state: LinkState, previous: LinkState) {
    match state {
        LinkState::Waiting => info!("Waiting for RC channels..."),
        LinkState::Lost => {
            if previous != LinkState::Lost {
                warn!(
                    "RC channels stale for {:?}, link lost",
                    store.channels_age().unwrap_or_default()
                );
            }
        }
        LinkState::Healthy => {
            if previous == LinkState::Lost {
                info!("RC channels restored");
            }
            info!(
                "Channels {:?} (age {:?})",
                store.channels(),
                store.channels_age().unwrap_or_default()
            );
        }
    }

    if store.has_link() {
        let link = store.link();
        info!(
            "Link LQ {}% RSSI {}dBm SNR {}dB ({:?}, {:?})",
            link.uplink_lq,
            link.active_rssi_dbm(),
            link.uplink_snr,
            link.rf_profile(),
            link.tx_power()
        );
    }
}

fn record(recorder: &mut TelemetryLogger, store: &SnapshotStore) {
    let record = TelemetryRecord::from_store(store);
    if record.is_empty() {
        return;
    }

    if let Err(e) = recorder.log(&record) {
        warn!("Failed to record telemetry: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);

    info!("CRSF Link v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let link = CrsfLink::init(&config.serial).context("Failed to start CRSF link")?;
    let store: Arc<SnapshotStore> = link.store();

    let mut recorder = if config.telemetry.enabled {
        Some(TelemetryLogger::new(&config.telemetry).context("Failed to start telemetry recorder")?)
    } else {
        None
    };

    let failsafe_timeout = Duration::from_millis(config.safety.failsafe_timeout_ms);
    let mut report_interval = interval(Duration::from_millis(config.safety.report_interval_ms));
    let mut telemetry_interval = interval(Duration::from_millis(config.telemetry.log_interval_ms));
    let mut state = LinkState::Waiting;

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = report_interval.tick() => {
                if !link.is_reader_running() {
                    warn!("CRSF reader stopped");
                    break;
                }

                let next = link_state(&store, failsafe_timeout);
                report(&store, next, state);
                state = next;
            }

            _ = telemetry_interval.tick(), if recorder.is_some() => {
                if let Some(recorder) = recorder.as_mut() {
                    record(recorder, &store);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if let Some(mut recorder) = recorder.take() {
        recorder.flush().context("Failed to flush telemetry")?;
    }

    let stats = link.shutdown().await.context("CRSF link failed")?;
    info!(
        "Frames decoded: {}, CRC errors: {}, length errors: {}, bytes skipped: {}",
        stats.frames_decoded, stats.crc_errors, stats.length_errors, stats.bytes_skipped
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_state_waiting_before_first_frame() {
        let store = SnapshotStore::new();
        assert_eq!(link_state(&store, Duration::from_millis(500)), LinkState::Waiting);
    }

    #[test]
    fn test_link_state_healthy_then_lost() {
        let store = SnapshotStore::new();
        store.update_channels([992; 16]);
        assert_eq!(link_state(&store, Duration::from_secs(60)), LinkState::Healthy);

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(link_state(&store, Duration::from_millis(1)), LinkState::Lost);
    }

    #[test]
    fn test_default_config_file_is_valid() {
        let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml")).unwrap();
        assert_eq!(config.serial.baud_rate, 420_000);
        assert!(!config.telemetry.enabled);
    }
}
