//! Driver configuration.
//!
//! All fields have defaults, so an empty YAML document is a valid config:
//!
//! ```yaml
//! request_timeout_ms: 10000
//! buffer_capacity: 1024
//! read_chunk_size: 256
//! uart:
//!   baud_rate: 921600
//!   parity: none
//!   data_bits: 8
//!   stop_bits: one
//!   flow_control: none
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult};

/// Default time a request waits for its response.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default baud rate of the module's UART.
pub const DEFAULT_BAUD_RATE: u32 = 921_600;

/// UART parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// UART stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    /// One stop bit.
    #[default]
    One,
    /// Two stop bits.
    Two,
}

/// UART flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// RTS/CTS.
    Hardware,
}

/// Serial framing parameters.
///
/// The driver does not open ports itself; these are handed to whatever
/// produces the [`Link`](crate::Link).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UartSettings {
    /// Baud rate.
    pub baud_rate: u32,
    /// Parity.
    pub parity: Parity,
    /// Data bits per character.
    pub data_bits: u8,
    /// Stop bits.
    pub stop_bits: StopBits,
    /// Flow control.
    pub flow_control: FlowControl,
}

impl Default for UartSettings {
    fn default() -> Self {
        UartSettings {
            baud_rate: DEFAULT_BAUD_RATE,
            parity: Parity::None,
            data_bits: 8,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Timeout used by [`Engine::request_default`](crate::Engine::request_default).
    pub request_timeout_ms: u64,
    /// Initial capacity of the send and receive buffers.
    pub buffer_capacity: usize,
    /// Maximum bytes taken from the link per read.
    pub read_chunk_size: usize,
    /// Serial framing parameters.
    pub uart: UartSettings,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            buffer_capacity: snic_protocol::DEFAULT_CAPACITY,
            read_chunk_size: 256,
            uart: UartSettings::default(),
        }
    }
}

impl DriverConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> DriverResult<Self> {
        let config: DriverConfig =
            serde_yaml::from_str(yaml).map_err(|e| DriverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML config file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> DriverResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| DriverError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> DriverResult<()> {
        if self.request_timeout_ms == 0 {
            return Err(DriverError::Config(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(DriverError::Config(
                "buffer_capacity must be positive".to_string(),
            ));
        }
        if self.read_chunk_size == 0 {
            return Err(DriverError::Config(
                "read_chunk_size must be positive".to_string(),
            ));
        }
        if !(5..=8).contains(&self.uart.data_bits) {
            return Err(DriverError::Config(format!(
                "data_bits must be 5-8, got {}",
                self.uart.data_bits
            )));
        }
        Ok(())
    }

    /// [`request_timeout_ms`](Self::request_timeout_ms) as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
