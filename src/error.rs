//! # Error Types
//!
//! Custom error types for the CRSF link driver using `thiserror`.

use thiserror::Error;

/// Main error type for the CRSF link driver
#[derive(Debug, Error)]
pub enum CrsfError {
    /// CRSF protocol errors (malformed frames, out-of-range payload fields)
    #[error("CRSF protocol error: {0}")]
    CrsfProtocol(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial transport errors (open, read, write)
    #[error("Serial error: {0}")]
    Serial(String),

    /// Telemetry record serialization errors
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] serde_json::Error),

    /// Background reader task failed to join
    #[error("Reader task error: {0}")]
    ReaderTask(String),
}

/// Result type alias for the CRSF link driver
pub type Result<T> = std::result::Result<T, CrsfError>;
