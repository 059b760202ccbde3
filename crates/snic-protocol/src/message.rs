//! Message header layout.
//!
//! ```text
//! byte 0 : R | sub_kind[6:0]     R = 1 for responses/confirmations
//! byte 1 : sequence number       host-assigned, wraps at 256
//! byte 2..: command-specific content
//! ```

use crate::buffer::ByteBuffer;
use crate::error::ProtocolError;

/// Size of the response-flag/sub-kind and sequence bytes.
pub const MESSAGE_HEADER_LEN: usize = 2;

const RESPONSE_BIT: u8 = 0x80;

/// Direction/role of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseFlag {
    /// Host request or device indication.
    RequestOrIndication,
    /// Device response or host confirmation.
    ResponseOrConfirmation,
}

/// The two fixed bytes at the start of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHeader {
    /// Request/indication vs. response/confirmation.
    pub flag: ResponseFlag,
    /// Operation within the category (7 bits).
    pub sub_kind: u8,
    /// Sequence number used for correlation.
    pub sequence: u8,
}

impl MessageHeader {
    /// Parse the header from the first two bytes of a message.
    pub fn parse(message: &[u8]) -> Result<Self, ProtocolError> {
        if message.len() < MESSAGE_HEADER_LEN {
            return Err(ProtocolError::MessageTooShort {
                actual: message.len(),
            });
        }
        let flag = if message[0] & RESPONSE_BIT != 0 {
            ResponseFlag::ResponseOrConfirmation
        } else {
            ResponseFlag::RequestOrIndication
        };
        Ok(MessageHeader {
            flag,
            sub_kind: message[0] & 0x7F,
            sequence: message[1],
        })
    }

    /// Encode the header into its two wire bytes.
    pub fn to_bytes(&self) -> [u8; MESSAGE_HEADER_LEN] {
        let flag = match self.flag {
            ResponseFlag::RequestOrIndication => 0,
            ResponseFlag::ResponseOrConfirmation => RESPONSE_BIT,
        };
        [flag | (self.sub_kind & 0x7F), self.sequence]
    }

    /// Whether this is a request or an indication.
    pub fn is_request_or_indication(&self) -> bool {
        self.flag == ResponseFlag::RequestOrIndication
    }
}

/// A decoded message borrowed from a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    category: u8,
    header: MessageHeader,
    bytes: &'a [u8],
}

impl<'a> Message<'a> {
    /// Parse a message received under `category`.
    pub fn parse(category: u8, bytes: &'a [u8]) -> Result<Self, ProtocolError> {
        let header = MessageHeader::parse(bytes)?;
        Ok(Message {
            category,
            header,
            bytes,
        })
    }

    /// Command category of the carrying frame.
    pub fn category(&self) -> u8 {
        self.category
    }

    /// The parsed header.
    pub fn header(&self) -> MessageHeader {
        self.header
    }

    /// Sub-kind identifier.
    pub fn sub_kind(&self) -> u8 {
        self.header.sub_kind
    }

    /// Sequence number.
    pub fn sequence(&self) -> u8 {
        self.header.sequence
    }

    /// All message bytes, header included.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Command-specific bytes after the header.
    pub fn content(&self) -> &'a [u8] {
        &self.bytes[MESSAGE_HEADER_LEN..]
    }
}

/// Rewind `buffer` and write a request header into it.
///
/// Content bytes must be appended after this call.
pub fn write_request_header(buffer: &mut ByteBuffer, sub_kind: u8, sequence: u8) {
    let header = MessageHeader {
        flag: ResponseFlag::RequestOrIndication,
        sub_kind,
        sequence,
    };
    buffer.rewind();
    buffer.append_slice(&header.to_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    #[test]
    fn test_parse_response_header() {
        let header = MessageHeader::parse(&[0x80 | GEN_FW_VER_GET_REQ, 5, 0x00]).unwrap();
        assert_eq!(header.flag, ResponseFlag::ResponseOrConfirmation);
        assert_eq!(header.sub_kind, GEN_FW_VER_GET_REQ);
        assert_eq!(header.sequence, 5);
        assert!(!header.is_request_or_indication());
    }

    #[test]
    fn test_parse_indication_header() {
        let header = MessageHeader::parse(&[WIFI_SCAN_RESULT_IND, 0xFF]).unwrap();
        assert_eq!(header.flag, ResponseFlag::RequestOrIndication);
        assert_eq!(header.sub_kind, WIFI_SCAN_RESULT_IND);
        assert_eq!(header.sequence, 0xFF);
    }

    #[test]
    fn test_short_message_rejected() {
        assert_eq!(
            MessageHeader::parse(&[0x08]),
            Err(ProtocolError::MessageTooShort { actual: 1 })
        );
        assert!(Message::parse(CMD_ID_GEN, &[]).is_err());
    }

    #[test]
    fn test_message_content_offsets() {
        let bytes = [0x88, 0x05, b'1', b'.', b'2'];
        let message = Message::parse(CMD_ID_GEN, &bytes).unwrap();
        assert_eq!(message.category(), CMD_ID_GEN);
        assert_eq!(message.sub_kind(), GEN_FW_VER_GET_REQ);
        assert_eq!(message.sequence(), 5);
        assert_eq!(message.content(), b"1.2");
        assert_eq!(message.as_bytes(), &bytes);
    }

    #[test]
    fn test_write_request_header_rewinds() {
        let mut buf = ByteBuffer::new();
        buf.append_slice(b"stale data");
        write_request_header(&mut buf, 0x7F | 0x80, 9);
        // the response bit is never set on a request
        assert_eq!(buf.as_slice(), &[0x7F, 9]);
    }
}
