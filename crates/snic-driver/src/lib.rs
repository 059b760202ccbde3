//! Host-side driver for SNIC WiFi modules attached over a UART.
//!
//! The [`Engine`] owns a [`Link`] and runs a reader thread that decodes
//! frames with [`snic_protocol::FrameDecoder`]. Callers issue blocking
//! requests; each gets a fresh sequence number and waits for the
//! response echoing it. Unsolicited indications are routed to observers
//! registered per (category, sub-kind).
//!
//! ```no_run
//! use std::net::TcpStream;
//! use snic_driver::{DriverConfig, Engine};
//! use snic_protocol::{IndicationKind, CMD_ID_GEN, GEN_FW_VER_GET_REQ};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpStream::connect("127.0.0.1:7000")?;
//! let engine = Engine::start(stream, DriverConfig::default())?;
//!
//! engine.register_kind(IndicationKind::PowerUp, |message| {
//!     println!("module reset: {:02X?}", message.content());
//! });
//!
//! let response = engine.request_default(CMD_ID_GEN, GEN_FW_VER_GET_REQ, |_| {})?;
//! println!("{:02X?}", response.content());
//! engine.stop();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod link;

pub use config::{DriverConfig, FlowControl, Parity, StopBits, UartSettings};
pub use correlation::{Correlation, EngineState, Response};
pub use dispatch::{IndicationDispatcher, IndicationObserver};
pub use engine::{DisconnectObserver, Engine, LinkFailure};
pub use error::{DriverError, DriverResult};
pub use link::{channel_link, ChannelLink, Closer, DevicePort, Link, LinkHalves, StreamLink};
