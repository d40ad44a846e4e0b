//! Property-based tests for the card frame decoder.
//!
//! These tests feed generated frames and noise byte by byte and check that
//! the decoder reports exactly the frames it should.

use doorkeeper_core::constants::{ETX, MAX_CARD_ID, STX};
use doorkeeper_protocol::{CardDecoder, LineAssembler, reader::parse_id_reply};
use proptest::prelude::*;

/// Build a well-formed frame for `id` with the correct checksum.
fn encode_frame(id: u64) -> Vec<u8> {
    let bytes = id.to_be_bytes();
    let payload = &bytes[3..];
    let checksum = payload.iter().fold(0u8, |acc, b| acc ^ b);

    let mut frame = vec![STX];
    frame.extend(format!("{id:010X}{checksum:02X}").into_bytes());
    frame.push(ETX);
    frame
}

/// Strategy for valid card ids (non-zero, 5 bytes).
fn card_id() -> impl Strategy<Value = u64> {
    1u64..=MAX_CARD_ID
}

/// Strategy for noise that contains neither STX nor ETX.
fn noise() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>().prop_filter("no markers", |b| *b != STX && *b != ETX), 0..32)
}

proptest! {
    /// Property: A well-formed frame closes exactly once and yields its id.
    #[test]
    fn prop_valid_frame_decodes(id in card_id()) {
        let mut decoder = CardDecoder::new();
        let closed = encode_frame(id).into_iter().filter(|&b| decoder.add_byte(b)).count();
        prop_assert_eq!(closed, 1);
        prop_assert_eq!(decoder.get_id(), id);
    }

    /// Property: Noise between frames never hides the following frame.
    #[test]
    fn prop_noise_before_frame_is_ignored(id in card_id(), garbage in noise()) {
        let mut decoder = CardDecoder::new();
        let mut bytes = garbage;
        bytes.push(ETX);
        bytes.extend(encode_frame(id));

        let mut ids = Vec::new();
        for b in bytes {
            if decoder.add_byte(b) {
                ids.push(decoder.get_id());
            }
        }
        prop_assert_eq!(ids, vec![id]);
    }

    /// Property: Flipping one checksum bit makes the id read as zero.
    #[test]
    fn prop_corrupted_checksum_yields_zero(id in card_id(), bit in 0u8..8) {
        let bytes = id.to_be_bytes();
        let checksum = bytes[3..].iter().fold(0u8, |acc, b| acc ^ b) ^ (1 << bit);

        let mut frame = vec![STX];
        frame.extend(format!("{id:010X}{checksum:02X}").into_bytes());
        frame.push(ETX);

        let mut decoder = CardDecoder::new();
        let closed = frame.into_iter().filter(|&b| decoder.add_byte(b)).count();
        prop_assert_eq!(closed, 1);
        prop_assert_eq!(decoder.get_id(), 0);
    }

    /// Property: A truncated frame never closes, and the next one still does.
    #[test]
    fn prop_truncated_frame_recovers(id in card_id(), cut in 1usize..13) {
        let full = encode_frame(id);
        let mut bytes = full[..cut].to_vec();
        bytes.push(ETX);
        bytes.extend(&full);

        let mut decoder = CardDecoder::new();
        let closed = bytes.into_iter().filter(|&b| decoder.add_byte(b)).count();
        prop_assert_eq!(closed, 1);
        prop_assert_eq!(decoder.get_id(), id);
    }

    /// Property: `ID` replies survive arbitrary chunking of the serial stream.
    #[test]
    fn prop_id_reply_chunking(id in card_id(), split in 0usize..14) {
        let reply = format!("ID{id:010X}\r\n");
        let (a, b) = reply.as_bytes().split_at(split.min(reply.len()));

        let mut lines = LineAssembler::new();
        lines.feed(a);
        lines.feed(b);
        let line = lines.next_line();
        prop_assert!(line.is_some());
        let parsed = line.and_then(|l| parse_id_reply(&l)).map(|c| c.as_u64());
        prop_assert_eq!(parsed, Some(id));
    }
}
