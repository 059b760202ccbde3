//! `snic`: query and monitor a SNIC WiFi module over a TCP-bridged UART.

use std::net::TcpStream;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use snic_driver::Engine;
use snic_runner::{init_logging, Cli, Command, RunnerError};
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), RunnerError> {
    let config = cli.driver_config()?;
    snic_metrics::describe_metrics();

    let stream = TcpStream::connect(&cli.connect).map_err(|source| RunnerError::Connect {
        addr: cli.connect.clone(),
        source,
    })?;
    let engine = Engine::start(stream, config)?;

    match &cli.command {
        Command::Version => {
            let version = snic_runner::version(&engine)?;
            println!("status:  0x{:02X}", version.status);
            println!("version: {}", version.version);
            engine.stop();
        }
        Command::Monitor { seconds } => {
            snic_runner::monitor(&engine, (*seconds).map(Duration::from_secs))?;
        }
    }
    Ok(())
}
