//! Property-based tests for stream reassembly

use super::*;
use proptest::prelude::*;

/// Payloads that can travel in a single frame: no blank line inside
fn arb_payload() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 .,!?]{1,24}",
        "[가-힣 ]{1,12}",
        Just("[DONE]".to_string()),
        Just(r#"{"type":"error","message":"rate limited"}"#.to_string()),
        "[a-z]{1,8}\n[a-z]{1,8}",
    ]
}

fn encode(payloads: &[String]) -> Vec<u8> {
    payloads
        .iter()
        .map(|p| format!("{DATA_PREFIX}{p}{FRAME_DELIMITER}"))
        .collect::<String>()
        .into_bytes()
}

/// Cut `bytes` at the given (sorted, deduplicated) offsets
fn split_at_offsets(bytes: &[u8], mut offsets: Vec<usize>) -> Vec<Vec<u8>> {
    offsets.retain(|o| *o > 0 && *o < bytes.len());
    offsets.sort_unstable();
    offsets.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for offset in offsets {
        chunks.push(bytes[start..offset].to_vec());
        start = offset;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

proptest! {
    /// Any chunking of a well-formed stream yields the same frames, in order
    #[test]
    fn prop_reassembly_is_chunking_independent(
        payloads in proptest::collection::vec(arb_payload(), 1..8),
        offsets in proptest::collection::vec(0usize..512, 0..16),
    ) {
        let bytes = encode(&payloads);
        let chunks = split_at_offsets(&bytes, offsets);

        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in &chunks {
            frames.extend(decoder.feed_bytes(chunk));
        }

        prop_assert_eq!(&frames, &payloads);
        prop_assert!(decoder.is_empty());
    }

    /// Classification of reassembled frames matches classification of the originals
    #[test]
    fn prop_classification_survives_chunking(
        payloads in proptest::collection::vec(arb_payload(), 1..8),
        chunk_size in 1usize..7,
    ) {
        let bytes = encode(&payloads);
        let mut decoder = FrameDecoder::new();
        let mut classified = Vec::new();
        for chunk in bytes.chunks(chunk_size) {
            classified.extend(decoder.feed_bytes(chunk).iter().map(|p| classify(p)));
        }

        let expected: Vec<Frame> = payloads.iter().map(|p| classify(p)).collect();
        prop_assert_eq!(classified, expected);
    }

    /// Nothing is emitted before the full delimiter has been seen
    #[test]
    fn prop_no_premature_emission(payload in arb_payload(), cut in 0usize..64) {
        let bytes = encode(std::slice::from_ref(&payload));
        let cut = cut % bytes.len();
        let (head, tail) = bytes.split_at(cut);

        let mut decoder = FrameDecoder::new();
        prop_assert!(decoder.feed_bytes(head).is_empty());
        prop_assert_eq!(decoder.feed_bytes(tail), vec![payload]);
    }

    /// Holding back only the final newline keeps the frame buffered
    #[test]
    fn prop_half_delimiter_never_emits(payload in arb_payload()) {
        let bytes = encode(std::slice::from_ref(&payload));
        let (head, last) = bytes.split_at(bytes.len() - 1);

        let mut decoder = FrameDecoder::new();
        prop_assert!(decoder.feed_bytes(head).is_empty());
        prop_assert!(!decoder.is_empty());
        prop_assert_eq!(decoder.feed_bytes(last).len(), 1);
    }
}
