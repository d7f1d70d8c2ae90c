//! # CRSF Packet Decoder
//!
//! Reassembles CRSF frames from a byte stream and validates them.
//!
//! [`FrameDecoder`] is an incremental state machine:
//!
//! ```text
//! SeekSync --(0xC8 | 0xEA)--> ReadLength --(2..=62)--> ReadBody --(L bytes)--> validate
//!     ^                            |                                               |
//!     +------(out of range)--------+-----------------(always)----------------------+
//! ```
//!
//! It keeps its state between calls, so frames can arrive split across any
//! number of transport reads. A frame with a bad CRC is dropped and the
//! machine restarts from `SeekSync` at the next byte; the discarded body is
//! not rescanned for an embedded sync byte. An out-of-range length byte is
//! different: it is examined again as a possible destination address, so
//! `C8 C8 18 ...` locks onto the second `C8` without waiting for another.

use tracing::{debug, trace};

use super::crc::crc8_dvb_s2;
use super::protocol::*;
use crate::error::{CrsfError, Result};
use crate::store::SnapshotStore;

/// Receive state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Discarding bytes until a destination address shows up
    SeekSync,
    /// Next byte is the frame length
    ReadLength { destination: u8 },
    /// Collecting `length` bytes of type + payload + crc
    ReadBody { destination: u8, length: usize },
}

/// Counters describing what the decoder has seen so far
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecoderStats {
    /// Every byte pushed into the decoder
    pub bytes_received: u64,
    /// Bytes discarded while looking for a sync byte
    pub bytes_skipped: u64,
    /// Length bytes outside 2..=62
    pub length_errors: u64,
    /// Complete frames whose CRC did not match
    pub crc_errors: u64,
    /// Complete frames that passed CRC validation
    pub frames_decoded: u64,
}

/// Incremental CRSF frame decoder
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    body: Vec<u8>,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates a decoder waiting for a sync byte
    pub fn new() -> Self {
        Self {
            state: DecoderState::SeekSync,
            body: Vec::with_capacity(CRSF_MAX_FRAME_LENGTH as usize),
            stats: DecoderStats::default(),
        }
    }

    /// Decoder counters
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// True when no frame is partially assembled
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::SeekSync
    }

    /// Push one byte, returning a frame when it completes a valid one
    pub fn push_byte(&mut self, byte: u8) -> Option<CrsfFrame> {
        self.stats.bytes_received += 1;

        match self.state {
            DecoderState::SeekSync => {
                self.seek_sync(byte);
                None
            }
            DecoderState::ReadLength { destination } => {
                if (CRSF_MIN_FRAME_LENGTH..=CRSF_MAX_FRAME_LENGTH).contains(&byte) {
                    self.body.clear();
                    self.state = DecoderState::ReadBody {
                        destination,
                        length: byte as usize,
                    };
                } else {
                    self.stats.length_errors += 1;
                    debug!(
                        "Rejecting CRSF frame with length {} (dest 0x{:02X})",
                        byte, destination
                    );
                    // The rejected byte may itself start the next frame
                    self.seek_sync(byte);
                }
                None
            }
            DecoderState::ReadBody {
                destination,
                length,
            } => {
                self.body.push(byte);
                if self.body.len() < length {
                    return None;
                }

                self.state = DecoderState::SeekSync;
                self.validate(destination)
            }
        }
    }

    /// Push a chunk of bytes, handing every valid frame to `on_frame`
    pub fn feed<F>(&mut self, data: &[u8], mut on_frame: F)
    where
        F: FnMut(CrsfFrame),
    {
        for &byte in data {
            if let Some(frame) = self.push_byte(byte) {
                on_frame(frame);
            }
        }
    }

    fn seek_sync(&mut self, byte: u8) {
        if Address::from_byte(byte).is_some() {
            self.state = DecoderState::ReadLength { destination: byte };
        } else {
            self.state = DecoderState::SeekSync;
            self.stats.bytes_skipped += 1;
        }
    }

    fn validate(&mut self, destination: u8) -> Option<CrsfFrame> {
        let (received_crc, type_and_payload) = self.body.split_last()?;
        let calculated_crc = crc8_dvb_s2(type_and_payload);

        if calculated_crc != *received_crc {
            self.stats.crc_errors += 1;
            trace!(
                "CRC mismatch: expected 0x{:02X}, got 0x{:02X}, body {:02X?}",
                calculated_crc,
                received_crc,
                self.body
            );
            return None;
        }

        self.stats.frames_decoded += 1;
        Some(CrsfFrame {
            destination,
            frame_type: type_and_payload[0],
            payload: type_and_payload[1..].to_vec(),
        })
    }
}

/// Route a validated frame into the snapshot store
///
/// Channel and link statistics frames replace their snapshot. Everything
/// else is decoded (or skipped) and dropped. Returns `true` when the store
/// was updated.
pub fn dispatch(frame: &CrsfFrame, store: &SnapshotStore) -> bool {
    match frame.decode() {
        Ok(Telemetry::Channels(channels)) => {
            store.update_channels(channels);
            true
        }
        Ok(Telemetry::Link(link)) => {
            store.update_link(link);
            true
        }
        Ok(other) => {
            trace!("Ignoring CRSF frame: {:?}", other);
            false
        }
        Err(e) => {
            debug!("Dropping malformed CRSF frame type 0x{:02X}: {}", frame.frame_type, e);
            false
        }
    }
}

/// Decode a complete CRSF frame held in one buffer
///
/// # Arguments
///
/// * `frame` - Complete CRSF frame bytes (destination, length, type, payload, crc)
///
/// # Errors
///
/// Returns error if:
/// - Frame is too short
/// - Destination byte is not a known address
/// - Length byte is out of range or disagrees with the buffer
/// - CRC check fails
pub fn decode_frame(frame: &[u8]) -> Result<CrsfFrame> {
    // Minimum frame size: dest(1) + length(1) + type(1) + crc(1) = 4 bytes
    if frame.len() < 4 {
        return Err(CrsfError::CrsfProtocol("Frame too short".to_string()));
    }

    if Address::from_byte(frame[0]).is_none() {
        return Err(CrsfError::CrsfProtocol(format!(
            "Invalid sync byte: 0x{:02X}",
            frame[0]
        )));
    }

    let length = frame[1];
    if !(CRSF_MIN_FRAME_LENGTH..=CRSF_MAX_FRAME_LENGTH).contains(&length) {
        return Err(CrsfError::CrsfProtocol(format!(
            "Invalid frame length: {}",
            length
        )));
    }

    let length = length as usize;
    if frame.len() != 2 + length {
        return Err(CrsfError::CrsfProtocol(format!(
            "Frame size mismatch: expected {} bytes, got {}",
            2 + length,
            frame.len()
        )));
    }

    let mut decoder = FrameDecoder::new();
    let mut decoded = None;
    decoder.feed(frame, |f| decoded = Some(f));

    decoded.ok_or_else(|| {
        let calculated = crc8_dvb_s2(&frame[2..frame.len() - 1]);
        CrsfError::CrsfProtocol(format!(
            "CRC mismatch: expected 0x{:02X}, got 0x{:02X}",
            calculated,
            frame[frame.len() - 1]
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crsf::channels::encode_channels;
    use crate::crsf::encoder::{
        encode_battery_frame, encode_gps_frame, encode_rc_channels_frame, build_frame,
    };

    fn zero_channels_frame() -> Vec<u8> {
        let mut frame = vec![0xC8, 0x18, 0x16];
        frame.extend_from_slice(&[0u8; 22]);
        frame.push(crc8_dvb_s2(&frame[2..]));
        frame
    }

    fn link_frame(link: &[u8; 10]) -> Vec<u8> {
        build_frame(Address::FlightController, FrameType::LinkStatistics, link)
            .unwrap()
            .to_vec()
    }

    fn sample_channels() -> RcChannels {
        let mut channels = [0u16; 16];
        for (i, ch) in channels.iter_mut().enumerate() {
            *ch = (i as u16 * 131 + 7) % 2048;
        }
        channels
    }

    fn feed_all(decoder: &mut FrameDecoder, data: &[u8]) -> Vec<CrsfFrame> {
        let mut frames = Vec::new();
        decoder.feed(data, |f| frames.push(f));
        frames
    }

    #[test]
    fn test_decode_zero_channels_scenario() {
        let frame = zero_channels_frame();
        assert_eq!(frame.last(), Some(&0xEF));

        let store = SnapshotStore::new();
        let mut decoder = FrameDecoder::new();
        decoder.feed(&frame, |f| {
            dispatch(&f, &store);
        });

        assert!(store.has_channels());
        assert_eq!(store.channels(), [0u16; 16]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_bit_flip_in_channels_payload_keeps_previous_snapshot() {
        let store = SnapshotStore::new();
        let mut decoder = FrameDecoder::new();
        let previous = sample_channels();

        let good = encode_rc_channels_frame(Address::FlightController, &previous);
        decoder.feed(&good, |f| {
            dispatch(&f, &store);
        });
        assert_eq!(store.channels(), previous);

        let mut corrupted = zero_channels_frame();
        corrupted[3 + 5] ^= 0x10; // byte 5 of the payload, CRC left as is
        decoder.feed(&corrupted, |f| {
            dispatch(&f, &store);
        });

        assert_eq!(store.channels(), previous);
        assert_eq!(store.counts().channels, 1);
        assert_eq!(decoder.stats().crc_errors, 1);
    }

    #[test]
    fn test_single_bit_flips_rejected_for_every_frame_type() {
        let frames = vec![
            encode_rc_channels_frame(Address::FlightController, &sample_channels()).to_vec(),
            link_frame(&[100, 95, 80, 10, 0, 2, 3, 90, 85, 12]),
            encode_battery_frame(
                Address::FlightController,
                &BatterySensor {
                    voltage: 126,
                    current: 50,
                    capacity: 2200,
                    remaining: 87,
                },
            )
            .unwrap()
            .to_vec(),
            encode_gps_frame(
                Address::Radio,
                &GpsData {
                    latitude: 377_749_000,
                    longitude: -1_224_194_000,
                    groundspeed: 255,
                    heading: 9000,
                    altitude: 1100,
                    satellites: 12,
                },
            )
            .unwrap()
            .to_vec(),
        ];

        for frame in frames {
            assert!(decode_frame(&frame).is_ok());

            // Flip each bit of type + payload, leaving the CRC byte intact
            for byte in 2..frame.len() - 1 {
                for bit in 0..8 {
                    let mut corrupted = frame.clone();
                    corrupted[byte] ^= 1 << bit;

                    let mut decoder = FrameDecoder::new();
                    assert!(
                        feed_all(&mut decoder, &corrupted).is_empty(),
                        "bit {} of byte {} accepted in frame type 0x{:02X}",
                        bit,
                        byte,
                        frame[2]
                    );
                }
            }
        }
    }

    #[test]
    fn test_resync_after_corrupted_frame() {
        let expected = sample_channels();
        let mut corrupted = encode_rc_channels_frame(Address::FlightController, &[1500; 16]).to_vec();
        let crc_index = corrupted.len() - 1;
        corrupted[crc_index] ^= 0xFF;

        let mut stream = corrupted;
        stream.extend_from_slice(&encode_rc_channels_frame(Address::FlightController, &expected));

        let mut decoder = FrameDecoder::new();
        let frames = feed_all(&mut decoder, &stream);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].decode().unwrap(), Telemetry::Channels(expected));
        assert_eq!(decoder.stats().crc_errors, 1);
        assert_eq!(decoder.stats().frames_decoded, 1);
    }

    #[test]
    fn test_partial_delivery_every_two_way_split() {
        let expected = sample_channels();
        let frame = encode_rc_channels_frame(Address::FlightController, &expected);

        for split in 1..frame.len() {
            let store = SnapshotStore::new();
            let mut decoder = FrameDecoder::new();

            for chunk in [&frame[..split], &frame[split..]] {
                decoder.feed(chunk, |f| {
                    dispatch(&f, &store);
                });
            }

            assert_eq!(store.counts().channels, 1, "split at {}", split);
            assert_eq!(store.channels(), expected, "split at {}", split);
        }
    }

    #[test]
    fn test_partial_delivery_every_three_way_split() {
        let frame = link_frame(&[100, 95, 80, 0xF6, 1, 2, 3, 90, 85, 12]);
        let expected = decode_link_statistics(&frame[3..13]).unwrap();

        for first in 1..frame.len() - 1 {
            for second in first + 1..frame.len() {
                let store = SnapshotStore::new();
                let mut decoder = FrameDecoder::new();

                for chunk in [&frame[..first], &frame[first..second], &frame[second..]] {
                    decoder.feed(chunk, |f| {
                        dispatch(&f, &store);
                    });
                }

                assert_eq!(store.counts().link, 1);
                assert_eq!(store.link(), expected);
            }
        }
    }

    #[test]
    fn test_byte_at_a_time_delivery() {
        let expected = sample_channels();
        let frame = encode_rc_channels_frame(Address::Radio, &expected);
        let mut decoder = FrameDecoder::new();

        let mut frames = Vec::new();
        for &byte in frame.iter() {
            if let Some(f) = decoder.push_byte(byte) {
                frames.push(f);
            }
        }

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].destination, 0xEA);
        assert_eq!(frames[0].payload, encode_channels(&expected).to_vec());
    }

    #[test]
    fn test_noise_between_frames_is_skipped() {
        let first = sample_channels();
        let second = [CRSF_CHANNEL_VALUE_CENTER; 16];

        let mut stream = vec![0x00, 0x16, 0xEE, 0x14, 0xFF, 0x7F];
        stream.extend_from_slice(&encode_rc_channels_frame(Address::FlightController, &first));
        stream.extend_from_slice(&[0x16, 0x02, 0x08, 0x1E, 0xEE]);
        stream.extend_from_slice(&encode_rc_channels_frame(Address::FlightController, &second));

        let mut decoder = FrameDecoder::new();
        let frames = feed_all(&mut decoder, &stream);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].decode().unwrap(), Telemetry::Channels(first));
        assert_eq!(frames[1].decode().unwrap(), Telemetry::Channels(second));
        assert_eq!(decoder.stats().bytes_skipped, 11);
    }

    #[test]
    fn test_invalid_length_restarts_sync() {
        let expected = sample_channels();

        // 0x01 and 0x3F are outside 2..=62
        let mut stream = vec![0xC8, 0x01, 0xEA, 0x3F];
        stream.extend_from_slice(&encode_rc_channels_frame(Address::FlightController, &expected));

        let mut decoder = FrameDecoder::new();
        let frames = feed_all(&mut decoder, &stream);

        assert_eq!(frames.len(), 1);
        assert_eq!(decoder.stats().length_errors, 2);
    }

    #[test]
    fn test_rejected_length_byte_can_start_next_frame() {
        let expected = sample_channels();

        // 0xEA syncs, the frame's own 0xC8 is read as length 200 and rejected,
        // then that same byte starts the real frame
        let mut stream = vec![0xEA];
        stream.extend_from_slice(&encode_rc_channels_frame(Address::FlightController, &expected));

        let mut decoder = FrameDecoder::new();
        let frames = feed_all(&mut decoder, &stream);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].decode().unwrap(), Telemetry::Channels(expected));
    }

    #[test]
    fn test_unknown_type_is_decoded_but_not_stored() {
        let store = SnapshotStore::new();
        let frame = build_frame(Address::FlightController, FrameType::Attitude, &[1, 2, 3, 4, 5, 6])
            .unwrap();

        let mut decoder = FrameDecoder::new();
        let frames = feed_all(&mut decoder, &frame);
        assert_eq!(frames.len(), 1);
        assert!(!dispatch(&frames[0], &store));
        assert!(!store.has_channels());
        assert!(!store.has_link());
    }

    #[test]
    fn test_wrong_size_channels_payload_not_stored() {
        let store = SnapshotStore::new();
        let mut frame = vec![0xC8, 0x17, 0x16];
        frame.extend_from_slice(&[0u8; 21]);
        frame.push(crc8_dvb_s2(&frame[2..]));

        let mut decoder = FrameDecoder::new();
        let frames = feed_all(&mut decoder, &frame);
        assert_eq!(frames.len(), 1);
        assert!(!dispatch(&frames[0], &store));
        assert!(!store.has_channels());
    }

    #[test]
    fn test_decode_frame_one_shot() {
        let frame = zero_channels_frame();
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.destination, 0xC8);
        assert_eq!(decoded.frame_type, 0x16);
        assert_eq!(decoded.payload.len(), 22);
    }

    #[test]
    fn test_decode_frame_errors() {
        assert!(decode_frame(&[0xC8, 0x03]).is_err());
        assert!(decode_frame(&[0xFF, 0x02, 0x16, 0x00]).is_err());
        assert!(decode_frame(&[0xC8, 0x40, 0x16, 0x00]).is_err());

        let mut frame = zero_channels_frame();
        frame.push(0x00);
        assert!(decode_frame(&frame).is_err());

        let mut frame = zero_channels_frame();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(matches!(decode_frame(&frame), Err(CrsfError::CrsfProtocol(_))));
    }
}
