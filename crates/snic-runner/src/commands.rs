//! The `version` and `monitor` commands.

use std::time::Duration;

use snic_driver::{Engine, EngineState};
use snic_protocol::{IndicationKind, Message, ResetCode, CMD_ID_GEN, GEN_FW_VER_GET_REQ};
use tracing::{info, warn};

use crate::error::RunnerError;

/// Decoded firmware version response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// Command status; zero is success.
    pub status: u8,
    /// Version string with trailing NULs removed.
    pub version: String,
}

impl FirmwareVersion {
    /// Parse response content: `status, length, bytes[length]`.
    pub fn parse(content: &[u8]) -> Result<Self, RunnerError> {
        let malformed = |detail: String| RunnerError::Malformed {
            what: "firmware version",
            detail,
        };
        let (&status, rest) = content
            .split_first()
            .ok_or_else(|| malformed("missing status byte".to_string()))?;
        let (&length, text) = rest
            .split_first()
            .ok_or_else(|| malformed("missing length byte".to_string()))?;
        let text = text.get(..length as usize).ok_or_else(|| {
            malformed(format!(
                "declares {} version bytes but carries {}",
                length,
                text.len()
            ))
        })?;
        Ok(FirmwareVersion {
            status,
            version: String::from_utf8_lossy(text)
                .trim_end_matches('\0')
                .to_string(),
        })
    }
}

/// Ask the module for its firmware version.
pub fn version(engine: &Engine) -> Result<FirmwareVersion, RunnerError> {
    let response = engine.request_default(CMD_ID_GEN, GEN_FW_VER_GET_REQ, |_| {})?;
    let version = FirmwareVersion::parse(response.content())?;
    if version.status != 0 {
        warn!(status = version.status, "module reported failure");
    }
    Ok(version)
}

/// One-line summary of an indication.
pub fn describe_indication(kind: IndicationKind, message: &Message<'_>) -> String {
    let content = message.content();
    match kind {
        IndicationKind::PowerUp if content.len() >= 2 => {
            let code = u16::from_be_bytes([content[0], content[1]]);
            format!("reset reason: {}", ResetCode::from(code))
        }
        _ => format!("{} bytes: {}", content.len(), hex::encode(content)),
    }
}

/// Log indications until `deadline` passes, Ctrl-C is pressed, or the link drops.
pub fn monitor(engine: &Engine, deadline: Option<Duration>) -> Result<(), RunnerError> {
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

    let ctrlc_tx = stop_tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.try_send(());
    })?;
    engine.on_disconnect(move |failure| {
        warn!("link lost: {}", failure);
        let _ = stop_tx.try_send(());
    });

    for kind in IndicationKind::ALL {
        engine.register_kind(kind, move |message| {
            info!(kind = %kind, "{}", describe_indication(kind, message));
        });
    }
    info!(link = engine.link_name(), "monitoring indications");

    // A timeout ends the run the same way a signal does.
    match deadline {
        Some(deadline) => {
            let _ = stop_rx.recv_timeout(deadline);
        }
        None => {
            let _ = stop_rx.recv();
        }
    }

    let disconnected = engine.state() == EngineState::Disconnected;
    engine.stop();
    if disconnected {
        return Err(snic_driver::DriverError::Disconnected.into());
    }
    Ok(())
}
