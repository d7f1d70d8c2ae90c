//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Only `[serial]` is required; the other sections fall back to defaults.
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! tx_pin = 17
//! rx_pin = 16
//! ```

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{CrsfError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub serial: SerialConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link configuration
///
/// `port` identifies the UART controller (the device path on a host).
/// `tx_pin` and `rx_pin` identify the pins routed to it, where the
/// platform lets the caller choose them.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default)]
    pub tx_pin: Option<u8>,

    #[serde(default)]
    pub rx_pin: Option<u8>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    #[serde(default = "default_read_retry_ms")]
    pub read_retry_ms: u64,

    #[serde(default = "default_max_read_errors")]
    pub max_read_errors: u32,
}

/// Link supervision configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SafetyConfig {
    /// Channel data older than this is reported as a lost link
    #[serde(default = "default_failsafe_timeout_ms")]
    pub failsafe_timeout_ms: u64,

    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
}

/// Telemetry recording configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 420000 }
fn default_read_buffer_size() -> usize { 64 }
fn default_read_retry_ms() -> u64 { 10 }
fn default_max_read_errors() -> u32 { 10 }

fn default_failsafe_timeout_ms() -> u64 { 500 }
fn default_report_interval_ms() -> u64 { 1000 }

fn default_telemetry_enabled() -> bool { false }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 100 }
fn default_log_format() -> String { "jsonl".to_string() }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            tx_pin: None,
            rx_pin: None,
            baud_rate: default_baud_rate(),
            read_buffer_size: default_read_buffer_size(),
            read_retry_ms: default_read_retry_ms(),
            max_read_errors: default_max_read_errors(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            failsafe_timeout_ms: default_failsafe_timeout_ms(),
            report_interval_ms: default_report_interval_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
            format: default_log_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> CrsfError {
    CrsfError::Config(toml::de::Error::custom(msg))
}

fn check_range(name: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(format!("{} must be between {} and {}", name, min, max)));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use crsf_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.serial.validate()?;
        self.safety.validate()?;
        self.telemetry.validate()?;
        self.logging.validate()
    }
}

impl SerialConfig {
    /// Validate the serial link settings
    pub fn validate(&self) -> Result<()> {
        if self.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if let (Some(tx), Some(rx)) = (self.tx_pin, self.rx_pin) {
            if tx == rx {
                return Err(invalid(format!("tx_pin and rx_pin must differ (both {})", tx)));
            }
        }

        if ![115200, 400000, 416666, 420000, 921600, 1870000, 3750000].contains(&self.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 115200, 400000, 416666, 420000, 921600, 1870000, 3750000",
            ));
        }

        check_range("read_buffer_size", self.read_buffer_size as u64, 1, 1024)?;
        check_range("read_retry_ms", self.read_retry_ms, 1, 60000)?;

        if self.max_read_errors == 0 {
            return Err(invalid("max_read_errors must be greater than 0"));
        }

        Ok(())
    }

    /// Pause between read attempts after a transport error
    pub fn read_retry_interval(&self) -> Duration {
        Duration::from_millis(self.read_retry_ms)
    }
}

impl SafetyConfig {
    pub fn validate(&self) -> Result<()> {
        check_range("failsafe_timeout_ms", self.failsafe_timeout_ms, 1, 60000)?;
        check_range("report_interval_ms", self.report_interval_ms, 1, 60000)
    }
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        check_range("log_interval_ms", self.log_interval_ms, 1, 60000)?;

        if self.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        if !["trace", "debug", "info", "warn", "error"].contains(&self.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        if matches!(&self.log_dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging log_dir cannot be empty when set"));
        }

        Ok(())
    }
}
