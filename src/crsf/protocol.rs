//! # CRSF Protocol Constants and Types
//!
//! Core protocol definitions for CRSF (Crossfire) communication.
//!
//! ```text
//! Frame := DEST(1) LEN(1) TYPE(1) PAYLOAD(LEN-2) CRC(1)
//! CRC   = crc8(TYPE ‖ PAYLOAD)
//! ```
//!
//! All multi-byte numeric payload fields are big-endian on the wire.

use serde::Serialize;

use super::channels::decode_channels;
use crate::error::{CrsfError, Result};

/// Maximum CRSF payload size
/// Frame structure: dest(1) + length(1) + type(1) + payload(N) + crc(1)
/// Maximum frame size is 64 bytes, so max payload = 64 - 4 = 60 bytes
pub const CRSF_MAX_PAYLOAD_SIZE: usize = 60;

/// Smallest legal value of the length byte (type + crc)
pub const CRSF_MIN_FRAME_LENGTH: u8 = 2;

/// Largest legal value of the length byte (type + 60-byte payload + crc)
pub const CRSF_MAX_FRAME_LENGTH: u8 = 62;

/// RC channels payload size (22 bytes for 16 channels × 11 bits)
pub const CRSF_RC_CHANNELS_PAYLOAD_SIZE: usize = 22;

/// Number of RC channels
pub const CRSF_NUM_CHANNELS: usize = 16;

/// Channel value range (11-bit: 0-2047)
pub const CRSF_CHANNEL_VALUE_MIN: u16 = 0;
pub const CRSF_CHANNEL_VALUE_MAX: u16 = 2047;
pub const CRSF_CHANNEL_VALUE_CENTER: u16 = 1024;

/// Link Statistics payload size
pub const CRSF_LINK_STATS_PAYLOAD_SIZE: usize = 10;

/// Battery Sensor payload size
pub const CRSF_BATTERY_SENSOR_PAYLOAD_SIZE: usize = 8;

/// GPS payload size
pub const CRSF_GPS_PAYLOAD_SIZE: usize = 15;

/// Largest capacity representable in the 24-bit battery field (mAh)
pub const CRSF_BATTERY_CAPACITY_MAX: u32 = 0x00FF_FFFF;

/// Offset added to GPS altitude on the wire (meters)
pub const CRSF_GPS_ALTITUDE_OFFSET: i32 = 1000;

/// RC channels array type (16 channels, 11-bit values)
pub type RcChannels = [u16; CRSF_NUM_CHANNELS];

/// Device address carried in the first byte of every frame.
///
/// On the receive side these double as sync bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Address {
    /// Flight controller (also the canonical CRSF sync byte)
    FlightController = 0xC8,
    /// Radio transmitter (handset)
    Radio = 0xEA,
}

impl Address {
    /// Map a raw byte to an address, `None` for anything else
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0xC8 => Some(Self::FlightController),
            0xEA => Some(Self::Radio),
            _ => None,
        }
    }
}

impl From<Address> for u8 {
    fn from(address: Address) -> Self {
        address as u8
    }
}

/// Frame types known to this driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Gps = 0x02,
    BatterySensor = 0x08,
    Altitude = 0x09,
    LinkStatistics = 0x14,
    RcChannelsPacked = 0x16,
    Attitude = 0x1E,
}

impl FrameType {
    /// Map a raw type byte to a known frame type
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x02 => Some(Self::Gps),
            0x08 => Some(Self::BatterySensor),
            0x09 => Some(Self::Altitude),
            0x14 => Some(Self::LinkStatistics),
            0x16 => Some(Self::RcChannelsPacked),
            0x1E => Some(Self::Attitude),
            _ => None,
        }
    }
}

impl From<FrameType> for u8 {
    fn from(frame_type: FrameType) -> Self {
        frame_type as u8
    }
}

/// Link statistics telemetry data
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkStatistics {
    /// Uplink RSSI (antenna 1) in -dBm
    pub uplink_rssi_1: u8,

    /// Uplink RSSI (antenna 2) in -dBm (diversity)
    pub uplink_rssi_2: u8,

    /// Uplink link quality (0-100%)
    pub uplink_lq: u8,

    /// Uplink SNR in dB
    pub uplink_snr: i8,

    /// Active antenna (0 or 1)
    pub active_antenna: u8,

    /// RF profile (see [`RfProfile`])
    pub rf_profile: u8,

    /// Uplink TX power (see [`TxPower`])
    pub uplink_tx_power: u8,

    /// Downlink RSSI in -dBm
    pub downlink_rssi: u8,

    /// Downlink link quality (0-100%)
    pub downlink_lq: u8,

    /// Downlink SNR in dB
    pub downlink_snr: i8,
}

impl LinkStatistics {
    /// Decoded RF profile
    pub fn rf_profile(&self) -> RfProfile {
        RfProfile::from(self.rf_profile)
    }

    /// Decoded uplink transmit power
    pub fn tx_power(&self) -> TxPower {
        TxPower::from(self.uplink_tx_power)
    }

    /// Uplink RSSI of the currently active antenna, in dBm
    pub fn active_rssi_dbm(&self) -> i16 {
        let magnitude = if self.active_antenna == 0 {
            self.uplink_rssi_1
        } else {
            self.uplink_rssi_2
        };
        -(magnitude as i16)
    }
}

/// RF profile (packet rate) reported in link statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfProfile {
    Fps4,
    Fps50,
    Fps150,
    Unknown(u8),
}

impl From<u8> for RfProfile {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Fps4,
            1 => Self::Fps50,
            2 => Self::Fps150,
            other => Self::Unknown(other),
        }
    }
}

/// Uplink transmit power reported in link statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPower {
    Mw0,
    Mw10,
    Mw25,
    Mw100,
    Mw500,
    Mw1000,
    Mw2000,
    Mw250,
    Mw50,
    Unknown(u8),
}

impl TxPower {
    /// Transmit power in milliwatts, `None` for unknown codes
    pub fn milliwatts(&self) -> Option<u16> {
        match self {
            Self::Mw0 => Some(0),
            Self::Mw10 => Some(10),
            Self::Mw25 => Some(25),
            Self::Mw100 => Some(100),
            Self::Mw500 => Some(500),
            Self::Mw1000 => Some(1000),
            Self::Mw2000 => Some(2000),
            Self::Mw250 => Some(250),
            Self::Mw50 => Some(50),
            Self::Unknown(_) => None,
        }
    }
}

impl From<u8> for TxPower {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Mw0,
            1 => Self::Mw10,
            2 => Self::Mw25,
            3 => Self::Mw100,
            4 => Self::Mw500,
            5 => Self::Mw1000,
            6 => Self::Mw2000,
            7 => Self::Mw250,
            8 => Self::Mw50,
            other => Self::Unknown(other),
        }
    }
}

/// Battery sensor telemetry data, in wire units
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatterySensor {
    /// Battery voltage in 0.1 V
    pub voltage: u16,

    /// Current draw in 0.1 A
    pub current: u16,

    /// Capacity used in mAh (24-bit on the wire)
    pub capacity: u32,

    /// Battery remaining percentage (0-100%)
    pub remaining: u8,
}

/// GPS telemetry data, in wire units
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GpsData {
    /// Latitude in degrees × 10^7
    pub latitude: i32,

    /// Longitude in degrees × 10^7
    pub longitude: i32,

    /// Ground speed in 0.1 km/h
    pub groundspeed: u16,

    /// Heading in 0.01 degrees
    pub heading: u16,

    /// Altitude in meters, offset by +1000
    pub altitude: u16,

    /// Number of satellites
    pub satellites: u8,
}

impl GpsData {
    /// Altitude in meters above sea level
    pub fn altitude_meters(&self) -> i32 {
        self.altitude as i32 - CRSF_GPS_ALTITUDE_OFFSET
    }

    /// Wire altitude for a height in meters, saturating at the field limits
    pub fn altitude_from_meters(meters: i32) -> u16 {
        meters
            .saturating_add(CRSF_GPS_ALTITUDE_OFFSET)
            .clamp(0, u16::MAX as i32) as u16
    }
}

/// A payload decoded from a validated frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Telemetry {
    Channels(RcChannels),
    Link(LinkStatistics),
    Battery(BatterySensor),
    Gps(GpsData),
    /// Altitude, attitude or any type byte this driver does not interpret
    Unsupported { frame_type: u8 },
}

/// CRSF frame structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrsfFrame {
    /// Destination address byte
    pub destination: u8,

    /// Frame type
    pub frame_type: u8,

    /// Payload data
    pub payload: Vec<u8>,
}

impl CrsfFrame {
    /// Create a new CRSF frame
    ///
    /// # Errors
    ///
    /// Returns error if payload exceeds CRSF_MAX_PAYLOAD_SIZE (60 bytes)
    pub fn new(destination: u8, frame_type: u8, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > CRSF_MAX_PAYLOAD_SIZE {
            return Err(CrsfError::CrsfProtocol(format!(
                "Payload size {} exceeds maximum {}",
                payload.len(),
                CRSF_MAX_PAYLOAD_SIZE
            )));
        }

        Ok(Self {
            destination,
            frame_type,
            payload,
        })
    }

    /// Get frame length (type + payload + crc)
    ///
    /// This is guaranteed not to overflow since payload is validated to be ≤ 60 bytes
    pub fn length(&self) -> u8 {
        (1 + self.payload.len() + 1) as u8
    }

    /// Decode the payload according to the frame type
    ///
    /// # Errors
    ///
    /// Returns error if a supported type carries a payload of the wrong size
    pub fn decode(&self) -> Result<Telemetry> {
        match FrameType::from_byte(self.frame_type) {
            Some(FrameType::RcChannelsPacked) => {
                let payload: &[u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE] =
                    self.payload.as_slice().try_into().map_err(|_| {
                        payload_size_error("RC channels", CRSF_RC_CHANNELS_PAYLOAD_SIZE, &self.payload)
                    })?;
                Ok(Telemetry::Channels(decode_channels(payload)))
            }
            Some(FrameType::LinkStatistics) => {
                decode_link_statistics(&self.payload).map(Telemetry::Link)
            }
            Some(FrameType::BatterySensor) => {
                decode_battery_sensor(&self.payload).map(Telemetry::Battery)
            }
            Some(FrameType::Gps) => decode_gps(&self.payload).map(Telemetry::Gps),
            _ => Ok(Telemetry::Unsupported {
                frame_type: self.frame_type,
            }),
        }
    }
}

fn payload_size_error(kind: &str, expected: usize, payload: &[u8]) -> CrsfError {
    CrsfError::CrsfProtocol(format!(
        "{} payload must be {} bytes, got {}",
        kind,
        expected,
        payload.len()
    ))
}

/// Decode Link Statistics telemetry payload (exactly 10 bytes)
pub fn decode_link_statistics(payload: &[u8]) -> Result<LinkStatistics> {
    let p: &[u8; CRSF_LINK_STATS_PAYLOAD_SIZE] = payload
        .try_into()
        .map_err(|_| payload_size_error("Link statistics", CRSF_LINK_STATS_PAYLOAD_SIZE, payload))?;

    Ok(LinkStatistics {
        uplink_rssi_1: p[0],
        uplink_rssi_2: p[1],
        uplink_lq: p[2],
        uplink_snr: p[3] as i8,
        active_antenna: p[4],
        rf_profile: p[5],
        uplink_tx_power: p[6],
        downlink_rssi: p[7],
        downlink_lq: p[8],
        downlink_snr: p[9] as i8,
    })
}

/// Decode Battery Sensor telemetry payload (exactly 8 bytes)
pub fn decode_battery_sensor(payload: &[u8]) -> Result<BatterySensor> {
    let p: &[u8; CRSF_BATTERY_SENSOR_PAYLOAD_SIZE] = payload.try_into().map_err(|_| {
        payload_size_error("Battery sensor", CRSF_BATTERY_SENSOR_PAYLOAD_SIZE, payload)
    })?;

    Ok(BatterySensor {
        voltage: u16::from_be_bytes([p[0], p[1]]),
        current: u16::from_be_bytes([p[2], p[3]]),
        capacity: u32::from_be_bytes([0, p[4], p[5], p[6]]),
        remaining: p[7],
    })
}

/// Decode GPS telemetry payload (exactly 15 bytes)
pub fn decode_gps(payload: &[u8]) -> Result<GpsData> {
    let p: &[u8; CRSF_GPS_PAYLOAD_SIZE] = payload
        .try_into()
        .map_err(|_| payload_size_error("GPS", CRSF_GPS_PAYLOAD_SIZE, payload))?;

    Ok(GpsData {
        latitude: i32::from_be_bytes([p[0], p[1], p[2], p[3]]),
        longitude: i32::from_be_bytes([p[4], p[5], p[6], p[7]]),
        groundspeed: u16::from_be_bytes([p[8], p[9]]),
        heading: u16::from_be_bytes([p[10], p[11]]),
        altitude: u16::from_be_bytes([p[12], p[13]]),
        satellites: p[14],
    })
}
