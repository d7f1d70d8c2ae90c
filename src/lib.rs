//! # CRSF Link Library
//!
//! Driver for the Crossfire (CRSF) serial protocol between a flight
//! controller and a radio receiver.
//!
//! A background reader decodes RC channels and link statistics from the
//! serial stream into a shared snapshot store, and battery and GPS
//! telemetry are encoded and written back over the same port.

pub mod config;
pub mod error;
pub mod crsf;
pub mod serial;
pub mod store;
pub mod link;
pub mod telemetry;
