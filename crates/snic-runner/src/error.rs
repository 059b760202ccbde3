//! Errors surfaced by the `snic` binary.

use snic_driver::DriverError;
use thiserror::Error;

/// Errors from running a command.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The driver failed.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The TCP bridge could not be reached.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Bridge address.
        addr: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The Ctrl-C handler could not be installed.
    #[error("failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// A response did not have the expected layout.
    #[error("malformed {what} response: {detail}")]
    Malformed {
        /// Which response.
        what: &'static str,
        /// What was wrong with it.
        detail: String,
    },
}
