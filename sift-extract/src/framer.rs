//! Packet framing state machine over a ring buffer

use bytes::Bytes;
use sift_core::{PacketDescriptor, Result, RingBuffer};

/// Scanning phase. The scanner suspends in whatever phase ran out of
/// buffered bytes and resumes there on the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    WaitForHeader,
    WaitForPacketSize,
    WaitForTermination,
}

/// Totals accumulated by one `try_parse_packets` call.
#[derive(Debug, Default)]
pub struct ProcessReport {
    /// Bytes discarded while resynchronizing past noise and false starts.
    pub wasted_bytes: usize,
    /// Bytes consumed as accepted packets.
    pub consumed_bytes: usize,
    /// Accepted packets in stream order, each an owned copy.
    pub packets: Vec<Bytes>,
}

/// Scanning packet extractor for one protocol.
///
/// Incoming bytes are buffered as they arrive, in whatever chunk sizes the
/// transport produced, and parsed on demand. The scanner hunts for a
/// verified header, decodes the packet length, and hands the completed
/// packet to the descriptor for final acceptance. Any byte that cannot
/// start a packet is skipped one at a time, which makes the scanner
/// self-resynchronizing after corruption.
pub struct PacketFramer<D: PacketDescriptor> {
    buffer: RingBuffer,
    descriptor: D,
    /// Scratch window laid out as a packet image; reused across packets.
    probe: Box<[u8]>,
    packet_size: usize,
    phase: Phase,
}

impl<D: PacketDescriptor> PacketFramer<D> {
    /// Create a framer buffering at most `capacity` bytes.
    ///
    /// The capacity should be at least the descriptor's maximum packet
    /// size, or full packets may never fit in the buffer at once.
    pub fn new(capacity: usize, descriptor: D) -> Self {
        let header = descriptor.header();
        let size = descriptor.size_field();
        let probe_len = descriptor
            .max_packet_size()
            .max(header.length)
            .max(size.start + size.length);
        PacketFramer {
            buffer: RingBuffer::new(capacity),
            descriptor,
            probe: vec![0u8; probe_len].into_boxed_slice(),
            packet_size: 0,
            phase: Phase::WaitForHeader,
        }
    }

    /// Append raw stream bytes to the scan buffer.
    ///
    /// Fails with `SiftError::BufferOverflow` when the chunk exceeds the
    /// free space; nothing is buffered in that case.
    pub fn receive(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.append(data)
    }

    /// Scan the buffered bytes for packets.
    ///
    /// Runs the phase machine until the buffer cannot satisfy the current
    /// phase, then suspends and reports what was found so far. Running out
    /// of data mid-packet is not an error; the scan resumes where it left
    /// off once more bytes arrive. A `capture_limit` of zero scans without
    /// bound; otherwise the call returns as soon as that many packets have
    /// been accepted.
    pub fn try_parse_packets(&mut self, capture_limit: usize) -> Result<ProcessReport> {
        let mut report = ProcessReport::default();
        let mut remaining = capture_limit;
        let header_len = self.descriptor.header().length;
        let size_field = self.descriptor.size_field();

        loop {
            match self.phase {
                Phase::WaitForHeader => {
                    let mut found = false;
                    while self.buffer.len() >= header_len {
                        self.buffer.peek_into(0, &mut self.probe[..header_len])?;
                        if self.descriptor.verify_header(&self.probe[..header_len]) {
                            found = true;
                            break;
                        }
                        self.buffer.skip(1)?;
                        report.wasted_bytes += 1;
                    }
                    if !found {
                        return Ok(report);
                    }
                    self.phase = Phase::WaitForPacketSize;
                }
                Phase::WaitForPacketSize => {
                    let window = size_field.start + size_field.length;
                    if self.buffer.len() < window {
                        return Ok(report);
                    }
                    self.buffer.peek_into(
                        size_field.start,
                        &mut self.probe[size_field.start..window],
                    )?;
                    let size = self
                        .descriptor
                        .decode_packet_size(&self.probe[size_field.start..window]);
                    if size == 0 || size > self.descriptor.max_packet_size() {
                        // A header followed by an unusable length is noise
                        // that happened to look like a packet start.
                        self.buffer.skip(header_len)?;
                        report.wasted_bytes += header_len;
                        self.phase = Phase::WaitForHeader;
                        continue;
                    }
                    self.packet_size = size;
                    self.phase = Phase::WaitForTermination;
                }
                Phase::WaitForTermination => {
                    if self.buffer.len() < self.packet_size {
                        return Ok(report);
                    }
                    self.buffer.peek_into(0, &mut self.probe[..self.packet_size])?;
                    if self.descriptor.verify_packet(&self.probe[..self.packet_size]) {
                        report
                            .packets
                            .push(Bytes::copy_from_slice(&self.probe[..self.packet_size]));
                        report.consumed_bytes += self.packet_size;
                        self.buffer.skip(self.packet_size)?;
                        self.phase = Phase::WaitForHeader;
                        self.packet_size = 0;
                        if remaining > 0 {
                            remaining -= 1;
                            if remaining == 0 {
                                return Ok(report);
                            }
                        }
                    } else {
                        // False positive: resume scanning one header past it.
                        self.buffer.skip(header_len)?;
                        report.wasted_bytes += header_len;
                        self.phase = Phase::WaitForHeader;
                        self.packet_size = 0;
                    }
                }
            }
        }
    }

    /// The scan buffer.
    pub fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }

    /// Mutable scan buffer, for flow-control layers that evict bytes.
    pub fn buffer_mut(&mut self) -> &mut RingBuffer {
        &mut self.buffer
    }

    /// The protocol descriptor driving the scan.
    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }
}
