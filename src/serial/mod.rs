//! # Serial Communication Module
//!
//! Handles the UART link to the CRSF receiver.
//!
//! This module handles:
//! - Opening the serial device at the CRSF baud rate (8N1, no flow control)
//! - Splitting it into independent receive and transmit halves
//! - Writing complete frames, finishing partial writes

pub mod port_trait;

use std::io;

use tokio::io::{ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::error::{CrsfError, Result};
pub use port_trait::{SerialRx, SerialTx, TokioSerialRx, TokioSerialTx};

/// CRSF baud rate (420,000 baud)
pub const CRSF_BAUD_RATE: u32 = 420_000;

/// Receive half of an opened serial device
pub type PortRx = TokioSerialRx<ReadHalf<SerialStream>>;

/// Transmit half of an opened serial device
pub type PortTx = TokioSerialTx<WriteHalf<SerialStream>>;

/// Open the configured serial device and split it into halves
///
/// The device is opened exclusively, so a second open of the same path
/// fails while the first handle is alive.
///
/// # Errors
///
/// Returns [`CrsfError::Serial`] if the device cannot be opened
pub fn open(config: &SerialConfig) -> Result<(PortRx, PortTx)> {
    debug!(
        "Opening serial port {} at {} baud (tx pin {:?}, rx pin {:?})",
        config.port, config.baud_rate, config.tx_pin, config.rx_pin
    );

    let port = open_port(&config.port, config.baud_rate)?;
    info!("Opened CRSF serial port {}", config.port);

    let (rx, tx) = tokio::io::split(port);
    Ok((TokioSerialRx::new(rx), TokioSerialTx::new(tx)))
}

/// Open a specific serial port with CRSF settings
fn open_port(path: &str, baud_rate: u32) -> Result<SerialStream> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| CrsfError::Serial(format!("Failed to open {}: {}", path, e)))?;

    Ok(port)
}

/// Write a complete frame and flush it
///
/// Partial writes are continued from the first unwritten byte until the
/// whole frame is out. A write that accepts zero bytes, or any I/O error,
/// is reported as a transport failure.
pub async fn write_frame<T>(tx: &mut T, frame: &[u8]) -> Result<()>
where
    T: SerialTx + ?Sized,
{
    let mut sent = 0;

    while sent < frame.len() {
        match tx.write(&frame[sent..]).await {
            Ok(0) => {
                return Err(CrsfError::Serial(format!(
                    "Serial write stalled after {} of {} bytes",
                    sent,
                    frame.len()
                )));
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(CrsfError::Serial(format!("Failed to write frame: {}", e)));
            }
        }
    }

    tx.flush()
        .await
        .map_err(|e| CrsfError::Serial(format!("Failed to flush serial port: {}", e)))?;

    debug!("Sent CRSF frame ({} bytes)", frame.len());
    Ok(())
}
