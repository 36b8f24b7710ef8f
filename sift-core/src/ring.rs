//! Fixed-capacity ring buffer for stream scanning

use smallvec::SmallVec;

use crate::error::{Result, SiftError};

/// Physical (position, length) spans backing a logical range. A range
/// crosses the wrap seam at most once, so two spans always suffice.
type Segments = SmallVec<[(usize, usize); 2]>;

/// Fixed-capacity circular byte queue.
///
/// Buffered bytes occupy the logical range `[start, start + len)` modulo
/// capacity. Reads and writes are split into at most two physical copies
/// at the wrap seam, so callers only ever see logical ordering. Every
/// operation that would touch bytes outside the occupied range fails with
/// the buffer left unchanged.
#[derive(Debug)]
pub struct RingBuffer {
    buf: Box<[u8]>,
    start: usize,
    len: usize,
}

impl RingBuffer {
    /// Create a buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            buf: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            len: 0,
        }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free space remaining for appends.
    pub fn free_space(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Append the whole slice at the tail.
    ///
    /// Fails with [`SiftError::BufferOverflow`] when the slice exceeds the
    /// free space; no bytes are written in that case.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.free_space() {
            return Err(SiftError::BufferOverflow {
                capacity: self.capacity(),
                buffered: self.len,
                requested: data.len(),
            });
        }
        self.copy_in(data);
        Ok(())
    }

    /// Append the longest prefix of `data` that fits, returning its length.
    pub fn append_upto(&mut self, data: &[u8]) -> usize {
        let take = data.len().min(self.free_space());
        self.copy_in(&data[..take]);
        take
    }

    /// Copy `out.len()` bytes starting at logical `offset` without
    /// consuming them.
    pub fn peek_into(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        if offset + out.len() > self.len {
            return Err(SiftError::InvalidRange {
                offset,
                requested: out.len(),
                buffered: self.len,
            });
        }
        let mut read = 0;
        for (pos, n) in self.segments(offset, out.len()) {
            out[read..read + n].copy_from_slice(&self.buf[pos..pos + n]);
            read += n;
        }
        Ok(())
    }

    /// Read the single byte at logical `offset`.
    pub fn byte_at(&self, offset: usize) -> Result<u8> {
        if offset >= self.len {
            return Err(SiftError::InvalidRange {
                offset,
                requested: 1,
                buffered: self.len,
            });
        }
        Ok(self.buf[(self.start + offset) % self.capacity()])
    }

    /// Copy `out.len()` bytes from the head and advance past them.
    pub fn consume_into(&mut self, out: &mut [u8]) -> Result<()> {
        self.peek_into(0, out)?;
        self.skip(out.len())
    }

    /// Advance the head past `count` bytes without copying.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        if count > self.len {
            return Err(SiftError::InvalidRange {
                offset: 0,
                requested: count,
                buffered: self.len,
            });
        }
        if count > 0 {
            self.start = (self.start + count) % self.capacity();
            self.len -= count;
        }
        Ok(())
    }

    /// Drop all buffered bytes. Slab contents are not zeroed.
    pub fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
    }

    fn copy_in(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut written = 0;
        for (pos, n) in self.segments(self.len, data.len()) {
            self.buf[pos..pos + n].copy_from_slice(&data[written..written + n]);
            written += n;
        }
        self.len += data.len();
    }

    /// Physical spans for the logical range `[offset, offset + len)`.
    fn segments(&self, offset: usize, len: usize) -> Segments {
        let mut segs = Segments::new();
        if len == 0 {
            return segs;
        }
        let cap = self.capacity();
        let first = (self.start + offset) % cap;
        let head = len.min(cap - first);
        segs.push((first, head));
        if head < len {
            segs.push((0, len - head));
        }
        segs
    }
}
