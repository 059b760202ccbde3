//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when building or reading protocol messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Message does not fit the 14-bit length field.
    #[error("frame too long: maximum {max} bytes, got {actual}")]
    FrameTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length requested.
        actual: usize,
    },

    /// Message is shorter than its two header bytes.
    #[error("message too short: expected at least 2 bytes, got {actual}")]
    MessageTooShort {
        /// Actual length received.
        actual: usize,
    },
}

/// Reasons the frame decoder discarded a frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Trailing checksum did not match the header.
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{found:02X}")]
    ChecksumMismatch {
        /// Checksum computed from the header.
        expected: u8,
        /// Checksum received on the wire.
        found: u8,
    },

    /// Byte after the checksum was not the end marker.
    #[error("missing end marker: got 0x{found:02X}")]
    MissingEndMarker {
        /// Byte received in place of the end marker.
        found: u8,
    },
}
