//! # CRSF Packet Encoder
//!
//! Builds complete, checksummed CRSF frames for transmission.
//!
//! Payload fields are written through [`bytes::BufMut`], whose `put_*`
//! methods are big-endian, matching the CRSF wire format on every host.

use bytes::{BufMut, Bytes, BytesMut};

use super::channels::encode_channels;
use super::crc::crc8_dvb_s2;
use super::protocol::*;
use crate::error::{CrsfError, Result};

/// Build a complete CRSF frame
///
/// Layout: `[destination][length][type][payload...][crc]` with
/// `length = 1 + payload.len() + 1` and `crc = crc8(type ‖ payload)`.
///
/// # Errors
///
/// Returns error if payload exceeds CRSF_MAX_PAYLOAD_SIZE (60 bytes)
///
/// # Examples
///
/// ```
/// use crsf_link::crsf::encoder::build_frame;
/// use crsf_link::crsf::protocol::{Address, FrameType};
///
/// let frame = build_frame(Address::FlightController, FrameType::BatterySensor, &[0u8; 8])?;
/// assert_eq!(frame.len(), 12);
/// assert_eq!(frame[1], 10);
/// # Ok::<(), crsf_link::error::CrsfError>(())
/// ```
pub fn build_frame(destination: Address, frame_type: FrameType, payload: &[u8]) -> Result<Bytes> {
    let frame = CrsfFrame::new(destination.into(), frame_type.into(), payload.to_vec())?;
    Ok(frame_to_bytes(&frame))
}

/// Serialize an already validated frame, stamping the CRC
pub fn frame_to_bytes(frame: &CrsfFrame) -> Bytes {
    let mut buf = BytesMut::with_capacity(frame.payload.len() + 4);
    buf.put_u8(frame.destination);
    buf.put_u8(frame.length());
    buf.put_u8(frame.frame_type);
    buf.put_slice(&frame.payload);

    // CRC covers Type + Payload (everything after the length byte)
    let crc = crc8_dvb_s2(&buf[2..]);
    buf.put_u8(crc);

    buf.freeze()
}

/// Encode battery sensor telemetry into its 8-byte payload
///
/// # Errors
///
/// Returns error if capacity does not fit the 24-bit wire field
pub fn encode_battery_payload(battery: &BatterySensor) -> Result<Bytes> {
    if battery.capacity > CRSF_BATTERY_CAPACITY_MAX {
        return Err(CrsfError::CrsfProtocol(format!(
            "Battery capacity {} mAh exceeds 24-bit maximum {}",
            battery.capacity, CRSF_BATTERY_CAPACITY_MAX
        )));
    }

    let mut buf = BytesMut::with_capacity(CRSF_BATTERY_SENSOR_PAYLOAD_SIZE);
    buf.put_u16(battery.voltage);
    buf.put_u16(battery.current);
    buf.put_uint(battery.capacity as u64, 3);
    buf.put_u8(battery.remaining);

    Ok(buf.freeze())
}

/// Encode a complete battery sensor frame
pub fn encode_battery_frame(destination: Address, battery: &BatterySensor) -> Result<Bytes> {
    let payload = encode_battery_payload(battery)?;
    build_frame(destination, FrameType::BatterySensor, &payload)
}

/// Encode GPS telemetry into its 15-byte payload
pub fn encode_gps_payload(gps: &GpsData) -> Bytes {
    let mut buf = BytesMut::with_capacity(CRSF_GPS_PAYLOAD_SIZE);
    buf.put_i32(gps.latitude);
    buf.put_i32(gps.longitude);
    buf.put_u16(gps.groundspeed);
    buf.put_u16(gps.heading);
    buf.put_u16(gps.altitude);
    buf.put_u8(gps.satellites);

    buf.freeze()
}

/// Encode a complete GPS frame
pub fn encode_gps_frame(destination: Address, gps: &GpsData) -> Result<Bytes> {
    build_frame(destination, FrameType::Gps, &encode_gps_payload(gps))
}

/// Encode RC channels into a complete CRSF frame (26 bytes)
pub fn encode_rc_channels_frame(destination: Address, channels: &RcChannels) -> Bytes {
    let frame = CrsfFrame {
        destination: destination.into(),
        frame_type: FrameType::RcChannelsPacked.into(),
        payload: encode_channels(channels).to_vec(),
    };
    frame_to_bytes(&frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crsf::decoder::decode_frame;

    #[test]
    fn test_build_battery_frame_exact_bytes() {
        let battery = BatterySensor {
            voltage: 126,   // 12.6 V
            current: 50,    // 5.0 A
            capacity: 2200, // mAh
            remaining: 87,  // %
        };

        let frame = encode_battery_frame(Address::FlightController, &battery).unwrap();

        let body = [0x08, 0x00, 0x7E, 0x00, 0x32, 0x00, 0x08, 0x98, 0x57];
        let mut expected = vec![0xC8, 0x0A];
        expected.extend_from_slice(&body);
        expected.push(crc8_dvb_s2(&body));

        assert_eq!(&frame[..], &expected[..]);
    }

    #[test]
    fn test_battery_capacity_overflow_rejected() {
        let battery = BatterySensor {
            capacity: CRSF_BATTERY_CAPACITY_MAX + 1,
            ..Default::default()
        };
        assert!(encode_battery_frame(Address::FlightController, &battery).is_err());

        let battery = BatterySensor {
            capacity: CRSF_BATTERY_CAPACITY_MAX,
            ..Default::default()
        };
        let payload = encode_battery_payload(&battery).unwrap();
        assert_eq!(&payload[4..7], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_gps_payload_is_big_endian() {
        let gps = GpsData {
            latitude: -1,
            longitude: 0x0102_0304,
            groundspeed: 0x0506,
            heading: 0x0708,
            altitude: GpsData::altitude_from_meters(100),
            satellites: 9,
        };

        let payload = encode_gps_payload(&gps);
        assert_eq!(payload.len(), CRSF_GPS_PAYLOAD_SIZE);
        assert_eq!(
            &payload[..],
            &[
                0xFF, 0xFF, 0xFF, 0xFF, // latitude
                0x01, 0x02, 0x03, 0x04, // longitude
                0x05, 0x06, // groundspeed
                0x07, 0x08, // heading
                0x04, 0x4C, // 1100 = 100 m + 1000
                0x09,
            ]
        );
    }

    #[test]
    fn test_gps_frame_decodes_back() {
        let gps = GpsData {
            latitude: 377_749_000,
            longitude: -1_224_194_000,
            groundspeed: 255,
            heading: 9000,
            altitude: 1100,
            satellites: 12,
        };

        let frame = encode_gps_frame(Address::Radio, &gps).unwrap();
        assert_eq!(frame[0], 0xEA);
        assert_eq!(frame[1], 17); // type + 15 + crc

        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.decode().unwrap(), Telemetry::Gps(gps));
    }

    #[test]
    fn test_build_frame_rejects_oversized_payload() {
        let result = build_frame(Address::FlightController, FrameType::Gps, &[0u8; 61]);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_frame_empty_payload() {
        let frame = build_frame(Address::FlightController, FrameType::Attitude, &[]).unwrap();
        assert_eq!(&frame[..3], &[0xC8, 0x02, 0x1E]);
        assert_eq!(frame[3], crc8_dvb_s2(&[0x1E]));
    }

    #[test]
    fn test_encode_rc_channels_frame_structure() {
        let channels = [CRSF_CHANNEL_VALUE_CENTER; CRSF_NUM_CHANNELS];
        let frame = encode_rc_channels_frame(Address::FlightController, &channels);

        // Frame should be 26 bytes: dest(1) + length(1) + type(1) + payload(22) + crc(1)
        assert_eq!(frame.len(), 26);
        assert_eq!(frame[0], 0xC8);
        assert_eq!(frame[1], 0x18);
        assert_eq!(frame[2], 0x16);
        assert_eq!(frame[25], crc8_dvb_s2(&frame[2..25]));
    }

    #[test]
    fn test_encode_frame_different_data_different_crc() {
        let frame1 = encode_rc_channels_frame(Address::FlightController, &[1000u16; 16]);
        let frame2 = encode_rc_channels_frame(Address::FlightController, &[1500u16; 16]);

        assert_ne!(frame1[25], frame2[25]);
    }
}
