//! # CRSF Protocol Module
//!
//! Implementation of the Crossfire (CRSF) serial protocol used by
//! ExpressLRS and TBS receivers.
//!
//! This module handles:
//! - RC channels payload packing (16 channels, 11-bit resolution)
//! - Link statistics, battery and GPS payloads
//! - CRC8-DVB-S2 checksum calculation
//! - Incremental frame synchronization and validation

pub mod protocol;
pub mod channels;
pub mod encoder;
pub mod decoder;
pub mod crc;
