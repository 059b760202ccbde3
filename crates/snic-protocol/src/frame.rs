//! Frame encoding/decoding utilities.
//!
//! Every message travels inside a frame:
//!
//! ```text
//! +-----+----------+--------------+------------+-------------+----------+-----+
//! | SOM | 1|len_lo | 1|A|len_hi   | 1|category | message[..] | 1|csum   | EOM |
//! +-----+----------+--------------+------------+-------------+----------+-----+
//! ```
//!
//! The length is 14 bits split into two 7-bit halves (the high half is 6
//! bits plus the ACK-required flag). The checksum is
//! `(len_lo + (A|len_hi) + category) & 0x7F`. Message bytes are written
//! unmodified and are not covered by the checksum; the declared length alone
//! bounds them, so a message byte equal to `SOM` or `EOM` is harmless.

use log::trace;

use crate::buffer::ByteBuffer;
use crate::constants::{ACK_BIT, EOM, MAX_MESSAGE_LEN, SOM, TOP_BIT};
use crate::error::{FrameError, ProtocolError};

/// Compute the 7-bit frame checksum.
///
/// `high` is the 7-bit high length field including the ACK bit.
pub fn frame_checksum(low: u8, high: u8, category: u8) -> u8 {
    ((low as u16 + high as u16 + category as u16) & 0x7F) as u8
}

/// Encode a frame into `out`, replacing its previous content.
///
/// `out` is rewound first so the same buffer can be reused for every send.
pub fn encode_frame(
    category: u8,
    message: &[u8],
    ack_required: bool,
    out: &mut ByteBuffer,
) -> Result<(), ProtocolError> {
    let len = message.len();
    if len > MAX_MESSAGE_LEN {
        return Err(ProtocolError::FrameTooLong {
            max: MAX_MESSAGE_LEN,
            actual: len,
        });
    }

    let low = (len & 0x7F) as u8;
    let mut high = ((len >> 7) & 0x3F) as u8;
    if ack_required {
        high |= ACK_BIT;
    }
    let category = category & 0x7F;

    out.rewind();
    out.append(SOM);
    out.append(low | TOP_BIT);
    out.append(high | TOP_BIT);
    out.append(category | TOP_BIT);
    out.append_slice(message);
    out.append(frame_checksum(low, high, category) | TOP_BIT);
    out.append(EOM);
    Ok(())
}

/// Encode a frame into a freshly allocated vector.
pub fn encode_frame_to_vec(
    category: u8,
    message: &[u8],
    ack_required: bool,
) -> Result<Vec<u8>, ProtocolError> {
    let mut out = ByteBuffer::with_capacity(message.len() + 6);
    encode_frame(category, message, ack_required, &mut out)?;
    Ok(out.as_slice().to_vec())
}

/// A validated frame borrowed from the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Command category (7 bits).
    pub category: u8,
    /// Whether the sender asked for a link-level ACK.
    pub ack_required: bool,
    /// The message bytes carried by the frame.
    pub message: &'a [u8],
}

/// Outcome of a completed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// A frame passed the end-marker and checksum checks.
    Frame(Frame<'a>),
    /// A frame was discarded; the decoder is seeking the next start marker.
    Invalid(FrameError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    SeekStart,
    LengthLow,
    LengthHigh,
    Category,
    Payload,
    Checksum,
    End,
}

/// Incremental frame decoder.
///
/// Bytes may be fed in chunks of any size; a frame split across several
/// reads is accumulated until complete. The decoder owns the receive buffer
/// and reuses it for every frame.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    low: u8,
    high: u8,
    category: u8,
    checksum: u8,
    length: usize,
    payload: ByteBuffer,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new frame decoder.
    pub fn new() -> Self {
        Self::with_buffer(ByteBuffer::new())
    }

    /// Create a decoder that accumulates payloads into `payload`.
    pub fn with_buffer(payload: ByteBuffer) -> Self {
        FrameDecoder {
            state: DecodeState::SeekStart,
            low: 0,
            high: 0,
            category: 0,
            checksum: 0,
            length: 0,
            payload,
        }
    }

    /// Whether the decoder is between frames.
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::SeekStart
    }

    /// Feed received bytes, calling `sink` for every completed frame.
    ///
    /// The [`Frame`] handed to `sink` borrows the receive buffer and is only
    /// valid for the duration of the call.
    pub fn feed<F>(&mut self, data: &[u8], mut sink: F)
    where
        F: FnMut(Decoded<'_>),
    {
        let mut pos = 0;
        while pos < data.len() {
            if self.state == DecodeState::Payload {
                let wanted = self.length - self.payload.position();
                let take = wanted.min(data.len() - pos);
                self.payload.append_slice(&data[pos..pos + take]);
                pos += take;
                if self.payload.position() == self.length {
                    self.state = DecodeState::Checksum;
                }
                continue;
            }

            let byte = data[pos];
            pos += 1;
            match self.step(byte) {
                Some(Ok(())) => sink(Decoded::Frame(self.frame())),
                Some(Err(err)) => {
                    trace!("discarding frame: {}", err);
                    sink(Decoded::Invalid(err));
                }
                None => {}
            }
        }
    }

    fn step(&mut self, byte: u8) -> Option<Result<(), FrameError>> {
        match self.state {
            DecodeState::SeekStart => {
                if byte == SOM {
                    self.state = DecodeState::LengthLow;
                }
            }
            DecodeState::LengthLow => {
                self.low = byte & 0x7F;
                self.state = DecodeState::LengthHigh;
            }
            DecodeState::LengthHigh => {
                self.high = byte & 0x7F;
                self.length = (((self.high & 0x3F) as usize) << 7) | self.low as usize;
                self.state = DecodeState::Category;
            }
            DecodeState::Category => {
                self.category = byte & 0x7F;
                self.payload.rewind();
                self.state = if self.length == 0 {
                    DecodeState::Checksum
                } else {
                    DecodeState::Payload
                };
            }
            DecodeState::Payload => {
                self.payload.append(byte);
                if self.payload.position() == self.length {
                    self.state = DecodeState::Checksum;
                }
            }
            DecodeState::Checksum => {
                self.checksum = byte & 0x7F;
                self.state = DecodeState::End;
            }
            DecodeState::End => {
                self.state = DecodeState::SeekStart;
                if byte != EOM {
                    return Some(Err(FrameError::MissingEndMarker { found: byte }));
                }
                let expected = frame_checksum(self.low, self.high, self.category);
                if expected != self.checksum {
                    return Some(Err(FrameError::ChecksumMismatch {
                        expected,
                        found: self.checksum,
                    }));
                }
                return Some(Ok(()));
            }
        }
        None
    }

    fn frame(&self) -> Frame<'_> {
        Frame {
            category: self.category,
            ack_required: self.high & ACK_BIT != 0,
            message: self.payload.as_slice(),
        }
    }
}
