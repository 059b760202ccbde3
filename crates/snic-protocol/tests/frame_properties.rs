//! Property tests for the frame codec.

use proptest::prelude::*;
use snic_protocol::{
    encode_frame_to_vec, ByteBuffer, Decoded, FrameDecoder, Message, MessageHeader, ResponseFlag,
};

/// Decode `data`, returning the valid frames and the number of discarded ones.
fn decode(data: &[u8]) -> (Vec<(u8, Vec<u8>)>, usize) {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    let mut invalid = 0;
    decoder.feed(data, |decoded| match decoded {
        Decoded::Frame(frame) => frames.push((frame.category, frame.message.to_vec())),
        Decoded::Invalid(_) => invalid += 1,
    });
    (frames, invalid)
}

fn flag_strategy() -> impl Strategy<Value = ResponseFlag> {
    prop_oneof![
        Just(ResponseFlag::RequestOrIndication),
        Just(ResponseFlag::ResponseOrConfirmation),
    ]
}

proptest! {
    /// Any category/sub-kind/sequence/content survives encode then decode.
    #[test]
    fn prop_roundtrip_preserves_message(
        category in 0u8..0x80,
        sub_kind in 0u8..0x80,
        sequence in any::<u8>(),
        flag in flag_strategy(),
        content in prop::collection::vec(any::<u8>(), 0..600),
        chunk in 1usize..64,
    ) {
        let header = MessageHeader { flag, sub_kind, sequence };
        let mut message = ByteBuffer::new();
        message.append_slice(&header.to_bytes());
        message.append_slice(&content);

        let wire = encode_frame_to_vec(category, message.as_slice(), false).unwrap();

        let mut decoder = FrameDecoder::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            decoder.feed(piece, |d| {
                if let Decoded::Frame(frame) = d {
                    decoded.push((frame.category, frame.message.to_vec()));
                }
            });
        }

        prop_assert_eq!(decoded.len(), 1);
        let (got_category, got_bytes) = &decoded[0];
        let parsed = Message::parse(*got_category, got_bytes).unwrap();
        prop_assert_eq!(parsed.category(), category);
        prop_assert_eq!(parsed.header(), header);
        prop_assert_eq!(parsed.content(), &content[..]);
    }

    /// Flipping a category, ACK or checksum bit invalidates the frame.
    #[test]
    fn prop_header_bit_flip_detected(
        category in 0u8..0x80,
        content in prop::collection::vec(any::<u8>(), 2..64),
        target in prop_oneof![
            (Just(3usize), 0u8..7),   // category bits
            (Just(2usize), Just(6u8)), // ACK bit
            (Just(usize::MAX), 0u8..7), // checksum bits
        ],
    ) {
        let mut wire = encode_frame_to_vec(category, &content, false).unwrap();
        let (index, bit) = target;
        let index = if index == usize::MAX { wire.len() - 2 } else { index };
        wire[index] ^= 1 << bit;

        let (frames, invalid) = decode(&wire);
        prop_assert!(frames.is_empty());
        prop_assert_eq!(invalid, 1);
    }

    /// Flipping a length bit never yields a valid frame.
    #[test]
    fn prop_length_bit_flip_detected(
        index in 1usize..3,
        bit in 0u8..7,
        len in 2usize..128,
    ) {
        // ACK bit is covered separately
        prop_assume!(!(index == 2 && bit == 6));
        let content = vec![0x55u8; len];
        let mut wire = encode_frame_to_vec(0x01, &content, false).unwrap();
        wire[index] ^= 1 << bit;
        // Enough trailing bytes for any enlarged length to complete
        wire.extend(std::iter::repeat(0u8).take(1 << 14));

        let (frames, invalid) = decode(&wire);
        prop_assert!(frames.is_empty());
        prop_assert!(invalid >= 1);
    }

    /// Message bytes are not checksummed: flipping one still decodes.
    #[test]
    fn prop_payload_bit_flip_not_detected(
        content in prop::collection::vec(any::<u8>(), 1..128),
        offset in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut wire = encode_frame_to_vec(0x50, &content, false).unwrap();
        let at = 4 + offset.index(content.len());
        wire[at] ^= 1 << bit;

        let (frames, invalid) = decode(&wire);
        prop_assert_eq!(invalid, 0);
        prop_assert_eq!(frames.len(), 1);
        prop_assert_eq!(&frames[0].1[..], &wire[4..4 + content.len()]);
    }
}
