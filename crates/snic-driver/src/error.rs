//! Error types for the driver.

use std::time::Duration;

use snic_protocol::ProtocolError;
use thiserror::Error;

/// Errors returned by the driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// No matching response arrived before the deadline.
    #[error(
        "no response to category 0x{category:02X} sub-kind 0x{sub_kind:02X} seq {sequence} within {timeout:?}"
    )]
    TimedOut {
        /// Category of the request.
        category: u8,
        /// Sub-kind of the request.
        sub_kind: u8,
        /// Sequence number the request was sent with.
        sequence: u8,
        /// How long the caller waited.
        timeout: Duration,
    },

    /// The link failed; the engine will never match another response.
    #[error("link disconnected")]
    Disconnected,

    /// The engine was stopped.
    #[error("engine is not running")]
    NotRunning,

    /// Writing to the link failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be framed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DriverError {
    /// Whether this is a timeout (the engine is still usable).
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::TimedOut { .. })
    }
}

/// Result type alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
