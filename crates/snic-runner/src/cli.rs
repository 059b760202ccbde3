//! Command line interface for the `snic` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use snic_driver::{DriverConfig, DriverResult};

/// Command line arguments for the `snic` binary.
#[derive(Debug, Parser)]
#[command(name = "snic", version, about = "Talk to a SNIC WiFi module over a TCP-bridged UART")]
pub struct Cli {
    /// Address of the TCP bridge exposing the module's UART.
    #[arg(short, long, value_name = "HOST:PORT")]
    pub connect: String,

    /// YAML driver configuration.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Request timeout in milliseconds, overriding the config file.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// What to do once connected.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Query the firmware version string.
    Version,
    /// Log every indication the module sends.
    Monitor {
        /// Stop after this many seconds instead of waiting for Ctrl-C.
        #[arg(long)]
        seconds: Option<u64>,
    },
}

impl Cli {
    /// Load the driver config and apply command-line overrides.
    pub fn driver_config(&self) -> DriverResult<DriverConfig> {
        let mut config = match &self.config {
            Some(path) => DriverConfig::from_yaml_file(path)?,
            None => DriverConfig::default(),
        };
        if let Some(timeout_ms) = self.timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }
        config.validate()?;
        Ok(config)
    }
}
