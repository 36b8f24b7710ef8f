//! Sift Test Utilities
//!
//! This crate provides the shared test protocol and stream-shaping helpers
//! used across the sift crates' test suites.

use serde::{Deserialize, Serialize};
use sift_core::{HeaderField, PacketDescriptor, SizeField};

/// Magic bytes opening every test packet.
pub const PACKET_MAGIC: [u8; 2] = [0x5A, 0xC7];

/// Fixed bytes around the payload: magic, length field, CRC32C trailer.
pub const PACKET_OVERHEAD: usize = 8;

/// Largest packet the test protocol allows.
pub const MAX_PACKET_SIZE: usize = 512;

/// Minimal length-prefixed test protocol.
///
/// Layout: 2 magic bytes, total length as u16 little-endian, payload,
/// CRC32C over everything before the trailer as u32 little-endian.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProtocol;

impl PacketDescriptor for EchoProtocol {
    fn max_packet_size(&self) -> usize {
        MAX_PACKET_SIZE
    }

    fn header(&self) -> HeaderField {
        HeaderField { length: 2 }
    }

    fn size_field(&self) -> SizeField {
        SizeField { start: 2, length: 2 }
    }

    fn verify_header(&self, window: &[u8]) -> bool {
        window == PACKET_MAGIC
    }

    fn decode_packet_size(&self, field: &[u8]) -> usize {
        u16::from_le_bytes([field[0], field[1]]) as usize
    }

    fn verify_packet(&self, packet: &[u8]) -> bool {
        if packet.len() < PACKET_OVERHEAD {
            return false;
        }
        let body = packet.len() - 4;
        let expect = u32::from_le_bytes([
            packet[body],
            packet[body + 1],
            packet[body + 2],
            packet[body + 3],
        ]);
        crc32c::crc32c(&packet[..body]) == expect
    }
}

/// Build a complete test packet around `payload`.
pub fn build_packet(payload: &[u8]) -> Vec<u8> {
    let total = payload.len() + PACKET_OVERHEAD;
    assert!(total <= MAX_PACKET_SIZE, "payload too large for test protocol");

    let mut packet = Vec::with_capacity(total);
    packet.extend_from_slice(&PACKET_MAGIC);
    packet.extend_from_slice(&(total as u16).to_le_bytes());
    packet.extend_from_slice(payload);
    let crc = crc32c::crc32c(&packet);
    packet.extend_from_slice(&crc.to_le_bytes());
    packet
}

/// Split `data` into chunks whose sizes cycle through `pattern`,
/// simulating arbitrary transport read sizes.
pub fn staggered_chunks<'a>(data: &'a [u8], pattern: &[usize]) -> Vec<&'a [u8]> {
    assert!(!pattern.is_empty(), "chunk pattern must not be empty");
    assert!(pattern.iter().all(|&n| n > 0), "chunk sizes must be positive");

    let mut chunks = Vec::new();
    let mut rest = data;
    let mut i = 0;
    while !rest.is_empty() {
        let take = pattern[i % pattern.len()].min(rest.len());
        chunks.push(&rest[..take]);
        rest = &rest[take..];
        i += 1;
    }
    chunks
}

/// Copy of `data` with the byte at `index` inverted.
pub fn flip_byte(data: &[u8], index: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    out[index] ^= 0xFF;
    out
}

/// Sample record for JSON capture and payload round-trip tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEvent {
    /// Sequence number.
    pub id: u32,
    /// Human-readable label.
    pub name: String,
    /// Free-form tags.
    pub tags: Vec<String>,
}

/// Deterministic batch of sample events.
pub fn sample_events(count: usize) -> Vec<SampleEvent> {
    (0..count)
        .map(|i| SampleEvent {
            id: i as u32,
            name: format!("event{}", i),
            tags: vec![format!("t{}", i % 3), "stream".to_string()],
        })
        .collect()
}

/// Serialize `events` back to back with `filler` bytes between them.
pub fn events_as_json_stream(events: &[SampleEvent], filler: &[u8]) -> Vec<u8> {
    let mut stream = Vec::new();
    for event in events {
        stream.extend_from_slice(filler);
        let json = serde_json::to_vec(event).expect("serialize sample event");
        stream.extend_from_slice(&json);
    }
    stream.extend_from_slice(filler);
    stream
}
