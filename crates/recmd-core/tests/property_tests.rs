//! Property-based tests for the record codec and format conversion.
//!
//! Uses proptest to generate random records and verify round-trip and
//! timeline invariants.

use proptest::prelude::*;
use std::time::Duration;

use recmd_core::{Chunks, Format, Record, Stream};

/// Generate a stream of binary chunks with unique nanosecond timestamps.
fn binary_chunks() -> impl Strategy<Value = Chunks> {
    prop::collection::btree_map(
        (0u64..10_000_000_000).prop_map(Duration::from_nanos),
        prop::collection::vec(any::<u8>(), 0..64),
        0..12,
    )
}

/// Generate a stream of text chunks with unique nanosecond timestamps.
fn text_chunks() -> impl Strategy<Value = Chunks> {
    prop::collection::btree_map(
        (0u64..10_000_000_000).prop_map(Duration::from_nanos),
        "\\PC{0,32}".prop_map(String::into_bytes),
        0..12,
    )
}

fn arb_record<S>(format: Format, chunks: fn() -> S) -> impl Strategy<Value = Record>
where
    S: Strategy<Value = Chunks>,
{
    ("[a-z/ -]{1,24}", -1i32..256, chunks(), chunks(), chunks())
        .prop_map(move |(command, exit_code, out, input, err)| {
            Record::new(command, exit_code, format, out, input, err)
        })
}

proptest! {
    /// Arbitrary bytes survive a base64 artifact round trip.
    #[test]
    fn base64_artifact_roundtrip(record in arb_record(Format::Base64, binary_chunks)) {
        let json = record.to_json().unwrap();
        let loaded = Record::from_json(&json).unwrap();
        prop_assert_eq!(loaded, record);
    }

    /// Valid text survives a string artifact round trip.
    #[test]
    fn string_artifact_roundtrip(record in arb_record(Format::String, text_chunks)) {
        let json = record.to_json().unwrap();
        let loaded = Record::from_json(&json).unwrap();
        prop_assert_eq!(loaded, record);
    }

    /// base64 -> string -> base64 is value-preserving for text records.
    #[test]
    fn text_conversion_roundtrip(record in arb_record(Format::Base64, text_chunks)) {
        prop_assert!(record.is_text());
        let back = record
            .convert_to(Format::String)
            .unwrap()
            .convert_to(Format::Base64)
            .unwrap();
        prop_assert_eq!(back, record);
    }

    /// The timeline holds every chunk exactly once, in non-decreasing order.
    #[test]
    fn timeline_is_complete_and_sorted(record in arb_record(Format::Base64, binary_chunks)) {
        let timeline = record.timeline();
        prop_assert_eq!(timeline.len(), record.chunk_count());

        for pair in timeline.windows(2) {
            prop_assert!((pair[0].at, pair[0].stream) < (pair[1].at, pair[1].stream));
        }

        for chunk in &timeline {
            prop_assert_eq!(record.chunks(chunk.stream).get(&chunk.at).map(Vec::as_slice), Some(chunk.data));
        }
    }

    /// Each stream contributes only its own chunks to the timeline.
    #[test]
    fn timeline_preserves_stream_tags(record in arb_record(Format::Base64, binary_chunks)) {
        for stream in Stream::ALL {
            let count = record.timeline().iter().filter(|c| c.stream == stream).count();
            prop_assert_eq!(count, record.chunks(stream).len());
        }
    }
}
