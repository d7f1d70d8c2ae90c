//! # CRC8-DVB-S2 Implementation
//!
//! CRC-8-DVB-S2 checksum calculation for CRSF protocol.
//!
//! **Polynomial**: 0xD5 (x^8 + x^7 + x^6 + x^4 + x^2 + 1)
//! **Initial Value**: 0x00
//!
//! The checksum covers the frame type byte and the payload. Both the
//! receive and transmit paths go through [`crc8_dvb_s2`].

/// CRC-8-DVB-S2 polynomial
const CRC8_POLY: u8 = 0xD5;

/// Precomputed CRC8 lookup table
const CRC8_TABLE: [u8; 256] = generate_crc8_table();

/// Shift one byte's worth of bits through the polynomial
const fn crc8_shift(mut crc: u8) -> u8 {
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 0x80 != 0 { (crc << 1) ^ CRC8_POLY } else { crc << 1 };
        bit += 1;
    }
    crc
}

const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut index = 0;
    while index < table.len() {
        table[index] = crc8_shift(index as u8);
        index += 1;
    }
    table
}

/// Calculate CRC8-DVB-S2 checksum
///
/// # Arguments
///
/// * `data` - Byte slice to calculate CRC for (Type + Payload)
///
/// # Examples
///
/// ```
/// use crsf_link::crsf::crc::crc8_dvb_s2;
///
/// // Battery sensor: 12.6 V, 5.0 A, 2200 mAh, 87 %
/// let type_and_payload = [0x08, 0x00, 0x7E, 0x00, 0x32, 0x00, 0x08, 0x98, 0x57];
/// assert_eq!(crc8_dvb_s2(&type_and_payload), 0x08);
/// ```
pub fn crc8_dvb_s2(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}
