//! Property-based tests for the extraction engines

use proptest::prelude::*;
use sift_extract::{JsonStreamExtractor, PacketFramer};
use sift_testkit::{
    build_packet, events_as_json_stream, sample_events, staggered_chunks, EchoProtocol,
    SampleEvent,
};

/// Noise byte that can never begin a header window.
const NOISE: u8 = 0x2E;

fn section_strategy() -> impl Strategy<Value = (usize, Vec<u8>)> {
    (0usize..12, prop::collection::vec(any::<u8>(), 0..40))
}

proptest! {
    #[test]
    fn packets_survive_arbitrary_chunking(
        sections in prop::collection::vec(section_strategy(), 1..6),
        trailing in 0usize..12,
        pattern in prop::collection::vec(1usize..24, 1..5),
    ) {
        let mut stream = Vec::new();
        let mut expected = Vec::new();
        let mut noise_total = 0usize;
        for (noise, payload) in &sections {
            stream.resize(stream.len() + noise, NOISE);
            noise_total += noise;
            let packet = build_packet(payload);
            stream.extend_from_slice(&packet);
            expected.push(packet);
        }
        stream.resize(stream.len() + trailing, NOISE);
        noise_total += trailing;

        let mut framer = PacketFramer::new(4096, EchoProtocol);
        let mut packets = Vec::new();
        let mut wasted = 0;
        let mut consumed = 0;
        for chunk in staggered_chunks(&stream, &pattern) {
            framer.receive(chunk).unwrap();
            let report = framer.try_parse_packets(0).unwrap();
            wasted += report.wasted_bytes;
            consumed += report.consumed_bytes;
            packets.extend(report.packets);
        }

        prop_assert_eq!(packets.len(), expected.len());
        for (got, want) in packets.iter().zip(&expected) {
            prop_assert_eq!(&got[..], &want[..]);
        }

        // Trailing noise keeps its last byte buffered: one byte is too
        // short for a header window, so the scanner leaves it pending.
        let leftover = usize::from(trailing > 0);
        prop_assert_eq!(wasted, noise_total - leftover);
        prop_assert_eq!(consumed, expected.iter().map(|p| p.len()).sum::<usize>());
        prop_assert_eq!(framer.buffer().len(), leftover);
    }

    #[test]
    fn json_captures_survive_arbitrary_chunking(
        count in 1usize..8,
        pattern in prop::collection::vec(1usize..17, 1..5),
    ) {
        let events = sample_events(count);
        let stream = events_as_json_stream(&events, b"..");

        let mut extractor = JsonStreamExtractor::new(1024);
        let mut captures = Vec::new();
        for chunk in staggered_chunks(&stream, &pattern) {
            captures.extend(extractor.parse(chunk).unwrap());
        }

        prop_assert_eq!(captures.len(), events.len());
        for (capture, event) in captures.iter().zip(&events) {
            let decoded: SampleEvent =
                serde_json::from_slice(capture).expect("captured event parses");
            prop_assert_eq!(&decoded, event);
        }
    }
}
