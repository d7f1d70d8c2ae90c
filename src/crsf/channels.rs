//! # RC Channel Bit Packing
//!
//! Converts between the 22-byte RC channels payload and 16 channel values.
//!
//! Channels are packed as a continuous bitstream of 11-bit fields, LSB first,
//! with no padding. Channel `i` occupies bits `i*11 .. i*11+11`:
//!
//! ```text
//! Byte 0: Ch1[0:7]
//! Byte 1: Ch1[8:10] | Ch2[0:4]
//! Byte 2: Ch2[5:10] | Ch3[0:1]
//! ...
//! ```

use super::protocol::{
    RcChannels, CRSF_CHANNEL_VALUE_MAX, CRSF_NUM_CHANNELS, CRSF_RC_CHANNELS_PAYLOAD_SIZE,
};

const CHANNEL_BITS: usize = 11;
const CHANNEL_MASK: u32 = 0x07FF;

/// Unpack 16 channels from a 22-byte payload
///
/// # Examples
///
/// ```
/// use crsf_link::crsf::channels::decode_channels;
///
/// let channels = decode_channels(&[0xFF; 22]);
/// assert_eq!(channels, [2047u16; 16]);
/// ```
pub fn decode_channels(payload: &[u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE]) -> RcChannels {
    let mut channels = [0u16; CRSF_NUM_CHANNELS];

    for (index, channel) in channels.iter_mut().enumerate() {
        let bit_offset = index * CHANNEL_BITS;
        let byte_index = bit_offset / 8;
        let shift = bit_offset % 8;

        // An 11-bit field starting at `shift` spans at most three bytes
        let mut window = payload[byte_index] as u32 | (payload[byte_index + 1] as u32) << 8;
        if let Some(&third) = payload.get(byte_index + 2) {
            window |= (third as u32) << 16;
        }

        *channel = ((window >> shift) & CHANNEL_MASK) as u16;
    }

    channels
}

/// Pack 16 channels into a 22-byte payload
///
/// Values above 2047 are clamped.
pub fn encode_channels(channels: &RcChannels) -> [u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE] {
    let mut payload = [0u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE];
    let mut accumulator: u32 = 0;
    let mut pending_bits = 0;
    let mut byte_index = 0;

    for &channel in channels.iter() {
        accumulator |= (clamp_channel_value(channel) as u32) << pending_bits;
        pending_bits += CHANNEL_BITS;

        while pending_bits >= 8 {
            payload[byte_index] = accumulator as u8;
            accumulator >>= 8;
            pending_bits -= 8;
            byte_index += 1;
        }
    }

    payload
}

/// Clamp a channel value to valid CRSF range (0-2047)
pub fn clamp_channel_value(value: u16) -> u16 {
    value.min(CRSF_CHANNEL_VALUE_MAX)
}
