//! # CRSF Link
//!
//! Public driver API: starts the background reader, serves the latest
//! decoded snapshots and transmits telemetry frames.
//!
//! ## Usage
//!
//! ```no_run
//! use crsf_link::config::SerialConfig;
//! use crsf_link::crsf::protocol::{Address, BatterySensor};
//! use crsf_link::link::CrsfLink;
//!
//! #[tokio::main]
//! async fn main() -> crsf_link::error::Result<()> {
//!     let link = CrsfLink::init(&SerialConfig::default())?;
//!
//!     let channels = link.receive_channels();
//!     println!("throttle: {}", channels[2]);
//!
//!     let battery = BatterySensor { voltage: 126, current: 50, capacity: 2200, remaining: 87 };
//!     link.send_battery_data(Address::FlightController, &battery).await?;
//!
//!     link.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod reader;

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::crsf::decoder::DecoderStats;
use crate::crsf::encoder::{encode_battery_frame, encode_gps_frame};
use crate::crsf::protocol::{Address, BatterySensor, GpsData, LinkStatistics, RcChannels};
use crate::error::{CrsfError, Result};
use crate::serial::{self, write_frame, SerialRx, SerialTx};
use crate::store::SnapshotStore;
pub use reader::ReaderSettings;

/// A running CRSF link
///
/// Dropping it stops the background reader.
pub struct CrsfLink {
    store: Arc<SnapshotStore>,
    tx: Mutex<Box<dyn SerialTx>>,
    reader: Option<JoinHandle<Result<DecoderStats>>>,
    shutdown: watch::Sender<bool>,
}

impl std::fmt::Debug for CrsfLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrsfLink")
            .field("store", &self.store)
            .field("reader_running", &self.is_reader_running())
            .finish_non_exhaustive()
    }
}

impl CrsfLink {
    /// Open the configured serial device and start receiving
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the device cannot
    /// be opened (including when another link already holds it).
    pub fn init(config: &SerialConfig) -> Result<Self> {
        config.validate()?;

        let (rx, tx) = serial::open(config)?;
        info!(
            "CRSF link on {} (tx pin {:?}, rx pin {:?})",
            config.port, config.tx_pin, config.rx_pin
        );

        Ok(Self::start(rx, tx, ReaderSettings::from(config)))
    }

    /// Start a link over an arbitrary transport
    pub fn start<R, T>(rx: R, tx: T, settings: ReaderSettings) -> Self
    where
        R: SerialRx + 'static,
        T: SerialTx + 'static,
    {
        let store = Arc::new(SnapshotStore::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let reader = tokio::spawn(reader::run_reader(
            rx,
            Arc::clone(&store),
            settings,
            shutdown_rx,
        ));

        Self {
            store,
            tx: Mutex::new(Box::new(tx)),
            reader: Some(reader),
            shutdown,
        }
    }

    /// Latest RC channels (all zero before the first channels frame)
    pub fn receive_channels(&self) -> RcChannels {
        self.store.channels()
    }

    /// Latest link statistics (zeroed before the first link frame)
    pub fn receive_link(&self) -> LinkStatistics {
        self.store.link()
    }

    /// Shared handle to the snapshot store
    pub fn store(&self) -> Arc<SnapshotStore> {
        Arc::clone(&self.store)
    }

    /// Send battery telemetry
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be encoded or the write fails
    pub async fn send_battery_data(&self, destination: Address, battery: &BatterySensor) -> Result<()> {
        let frame = encode_battery_frame(destination, battery)?;
        self.send_frame(&frame).await
    }

    /// Send GPS telemetry
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub async fn send_gps_data(&self, destination: Address, gps: &GpsData) -> Result<()> {
        let frame = encode_gps_frame(destination, gps)?;
        self.send_frame(&frame).await
    }

    /// Write one pre-built frame; concurrent senders are serialized
    pub async fn send_frame(&self, frame: &[u8]) -> Result<()> {
        let mut tx = self.tx.lock().await;
        write_frame(&mut **tx, frame).await
    }

    /// False once the reader has stopped (shutdown or transport failure)
    pub fn is_reader_running(&self) -> bool {
        self.reader
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the reader and wait for it
    ///
    /// # Errors
    ///
    /// Returns the reader's transport error if it had already failed
    pub async fn shutdown(mut self) -> Result<DecoderStats> {
        // The reader may already be gone, in which case nobody is listening
        let _ = self.shutdown.send(true);

        let handle = self
            .reader
            .take()
            .ok_or_else(|| CrsfError::ReaderTask("reader already stopped".to_string()))?;

        let stats = handle
            .await
            .map_err(|e| CrsfError::ReaderTask(e.to_string()))??;

        debug!("CRSF link shut down");
        Ok(stats)
    }
}

impl Drop for CrsfLink {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
    }
}
