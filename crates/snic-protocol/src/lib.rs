//! SNIC UART Protocol
//!
//! This crate provides the wire-level types for talking to a SNIC WiFi
//! co-processor over its UART. Everything here is synchronous and free of
//! threads; the request/indication engine lives in `snic-driver`.
//!
//! # Protocol Overview
//!
//! Each frame on the wire is delimited by a start marker (`SOM`, 0x02) and an
//! end marker (`EOM`, 0x04). The header carries a 14-bit payload length, an
//! ACK-required flag and the command category; a 7-bit checksum over the
//! header follows the payload. Header and trailer bytes always have their top
//! bit set so they can never be mistaken for a marker.
//!
//! The payload of every frame is a message whose first two bytes are the
//! response flag + sub-kind and the host-assigned sequence number:
//!
//! - **Requests** (host → firmware): response flag clear
//! - **Responses** (firmware → host): response flag set, sequence echoed back
//! - **Indications** (firmware → host, unsolicited): response flag clear
//!
//! # Example
//!
//! ```rust
//! use snic_protocol::{encode_frame_to_vec, ByteBuffer, Decoded, FrameDecoder, CMD_ID_GEN, GEN_FW_VER_GET_REQ};
//!
//! let mut message = ByteBuffer::new();
//! snic_protocol::write_request_header(&mut message, GEN_FW_VER_GET_REQ, 7);
//! let wire = encode_frame_to_vec(CMD_ID_GEN, message.as_slice(), false).unwrap();
//!
//! let mut decoder = FrameDecoder::new();
//! let mut frames = 0;
//! decoder.feed(&wire, |decoded| {
//!     if let Decoded::Frame(frame) = decoded {
//!         assert_eq!(frame.category, CMD_ID_GEN);
//!         frames += 1;
//!     }
//! });
//! assert_eq!(frames, 1);
//! ```

mod buffer;
mod constants;
mod error;
mod frame;
mod message;

pub use buffer::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use message::*;
