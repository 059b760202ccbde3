//! Command-line front end for the SNIC UART driver.
//!
//! The `snic` binary connects to a module whose UART is bridged to TCP
//! and either queries its firmware version or logs its indications.

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::{Cli, Command};
pub use commands::{describe_indication, monitor, version, FirmwareVersion};
pub use error::RunnerError;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
