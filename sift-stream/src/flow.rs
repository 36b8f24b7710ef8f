//! Flow-controlled packet extraction with congestion policies

use std::sync::{Mutex, RwLock};

use bytes::Bytes;
use sift_core::{PacketDescriptor, Result, SiftError};
use sift_extract::PacketFramer;
use tracing::debug;

use crate::gate::CapacityGate;

const DEFAULT_DRAIN_BATCH_LIMIT: usize = 5;

/// What to do with incoming bytes that do not fit in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionPolicy {
    /// Block the producer until extraction frees enough space.
    BlockAndWait,
    /// Evict the oldest buffered bytes and admit the whole chunk.
    DropOldest,
    /// Discard the front of the chunk and admit the trailing part that fits.
    DropLatestHead,
    /// Discard the back of the chunk and admit the leading part that fits.
    DropLatestTail,
}

impl Default for CongestionPolicy {
    fn default() -> Self {
        CongestionPolicy::BlockAndWait
    }
}

/// Construction-time flow tuning.
#[derive(Debug, Clone, Copy)]
pub struct FlowOptions {
    /// Congestion policy applied when admission outruns extraction.
    pub policy: CongestionPolicy,
    /// Packets extracted per drain pass before the framer unlocks and the
    /// receiver runs; zero extracts everything in a single pass.
    pub drain_batch_limit: usize,
}

impl Default for FlowOptions {
    fn default() -> Self {
        FlowOptions {
            policy: CongestionPolicy::default(),
            drain_batch_limit: DEFAULT_DRAIN_BATCH_LIMIT,
        }
    }
}

/// Callback receiving extracted packets during a drain.
pub trait PacketReceiver {
    /// Called once per extracted packet, in stream order.
    fn on_packet(&self, packet: Bytes);
}

impl<F> PacketReceiver for F
where
    F: Fn(Bytes),
{
    fn on_packet(&self, packet: Bytes) {
        self(packet)
    }
}

/// Thread-safe packet framer with bounded-memory admission.
///
/// Wraps a [`PacketFramer`] behind a reader-writer lock and meters every
/// buffered byte through a [`CapacityGate`]. Producers call `receive` from
/// any thread; any thread may call `drain` to run extraction and hand the
/// recovered packets to the registered receiver. When a chunk does not fit
/// in the buffer's free space, the configured [`CongestionPolicy`] decides
/// who gives way.
pub struct FlowControlledFramer<D: PacketDescriptor> {
    framer: RwLock<PacketFramer<D>>,
    gate: CapacityGate,
    receiver: Mutex<Option<Box<dyn PacketReceiver + Send>>>,
    options: FlowOptions,
    capacity: usize,
}

impl<D: PacketDescriptor> FlowControlledFramer<D> {
    /// Create a flow-controlled framer with default options.
    pub fn new(capacity: usize, descriptor: D) -> Self {
        Self::with_options(capacity, descriptor, FlowOptions::default())
    }

    /// Create a flow-controlled framer with explicit options.
    pub fn with_options(capacity: usize, descriptor: D, options: FlowOptions) -> Self {
        FlowControlledFramer {
            framer: RwLock::new(PacketFramer::new(capacity, descriptor)),
            gate: CapacityGate::new(capacity),
            receiver: Mutex::new(None),
            options,
            capacity,
        }
    }

    /// Register the receiver drains dispatch to, replacing any previous
    /// one. A receiver must not call `drain` itself.
    pub fn set_receiver(&self, receiver: Box<dyn PacketReceiver + Send>) {
        *self.receiver.lock().unwrap() = Some(receiver);
    }

    /// Free buffer space right now.
    pub fn available_space(&self) -> usize {
        self.framer.read().unwrap().buffer().free_space()
    }

    /// Admission permits available right now.
    ///
    /// At quiescence this equals `available_space`; while admissions are
    /// in flight the two may briefly disagree.
    pub fn available_permits(&self) -> usize {
        self.gate.available()
    }

    /// Admit a chunk of raw stream bytes, returning how many were admitted.
    ///
    /// When the chunk exceeds the free space the congestion policy
    /// resolves it: `BlockAndWait` waits for extraction to free space,
    /// `DropOldest` evicts buffered bytes, and the `DropLatest` policies
    /// trim the chunk itself. A chunk longer than the whole buffer can
    /// never be admitted and fails with `SiftError::BufferOverflow`.
    pub fn receive(&self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        if data.len() > self.capacity {
            return Err(SiftError::BufferOverflow {
                capacity: self.capacity,
                buffered: self.framer.read().unwrap().buffer().len(),
                requested: data.len(),
            });
        }
        match self.options.policy {
            CongestionPolicy::BlockAndWait => {
                self.gate.acquire(data.len());
                self.framer.write().unwrap().receive(data)?;
                Ok(data.len())
            }
            CongestionPolicy::DropOldest => {
                while !self.gate.try_acquire(data.len()) {
                    self.evict_for(data.len())?;
                }
                self.framer.write().unwrap().receive(data)?;
                Ok(data.len())
            }
            CongestionPolicy::DropLatestHead | CongestionPolicy::DropLatestTail => {
                self.receive_trimmed(data)
            }
        }
    }

    /// Evict buffered bytes from the head until the incoming length fits.
    fn evict_for(&self, incoming: usize) -> Result<()> {
        let mut framer = self.framer.write().unwrap();
        // Shortfall is recomputed under the exclusive lock; a concurrent
        // drain may have freed space since the failed acquire.
        let shortfall = incoming.saturating_sub(self.gate.available());
        let droppable = shortfall.min(framer.buffer().len());
        if droppable == 0 {
            // The missing permits belong to admissions still in flight on
            // other threads; let them land, then retry.
            drop(framer);
            std::thread::yield_now();
            return Ok(());
        }
        framer.buffer_mut().skip(droppable)?;
        self.gate.release(droppable);
        debug!(
            dropped = droppable,
            incoming, "evicted oldest buffered bytes to admit chunk"
        );
        Ok(())
    }

    /// Admit whatever portion of the chunk fits, trimming per the policy.
    fn receive_trimmed(&self, data: &[u8]) -> Result<usize> {
        let mut slice = data;
        loop {
            if slice.is_empty() {
                debug!(dropped = data.len(), "no free space, whole chunk dropped");
                return Ok(0);
            }
            if self.gate.try_acquire(slice.len()) {
                break;
            }
            let fit = self.gate.available().min(slice.len());
            let dropped = slice.len() - fit;
            if dropped > 0 {
                slice = match self.options.policy {
                    CongestionPolicy::DropLatestHead => &slice[dropped..],
                    _ => &slice[..fit],
                };
                debug!(
                    policy = ?self.options.policy,
                    dropped,
                    admitted = slice.len(),
                    "trimmed incoming chunk to fit free space"
                );
            }
        }
        self.framer.write().unwrap().receive(slice)?;
        Ok(slice.len())
    }

    /// Run extraction until no more packets are buffered.
    ///
    /// Each pass parses up to `drain_batch_limit` packets under the write
    /// lock and frees their permits; the receiver then runs with the
    /// framer unlocked so producers keep flowing. Packets extracted while
    /// no receiver is registered are discarded. Returns the number of
    /// packets extracted.
    pub fn drain(&self) -> Result<usize> {
        let mut extracted = 0;
        loop {
            let report = {
                let mut framer = self.framer.write().unwrap();
                framer.try_parse_packets(self.options.drain_batch_limit)?
            };
            let freed = report.consumed_bytes + report.wasted_bytes;
            if freed > 0 {
                self.gate.release(freed);
            }
            if report.packets.is_empty() {
                return Ok(extracted);
            }
            extracted += report.packets.len();
            let receiver = self.receiver.lock().unwrap();
            match receiver.as_ref() {
                Some(receiver) => {
                    for packet in report.packets {
                        receiver.on_packet(packet);
                    }
                }
                None => {
                    debug!(
                        discarded = report.packets.len(),
                        "drained packets with no receiver registered"
                    );
                }
            }
        }
    }
}
