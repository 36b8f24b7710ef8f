//! Error types for sift

use thiserror::Error;

/// Sift error types
#[derive(Debug, Error)]
pub enum SiftError {
    /// Append would exceed the buffer's free space; the buffer is unchanged.
    #[error("Buffer overflow: {requested} bytes requested with {buffered} of {capacity} in use")]
    BufferOverflow {
        /// Total buffer capacity.
        capacity: usize,
        /// Bytes already buffered.
        buffered: usize,
        /// Bytes the rejected append asked for.
        requested: usize,
    },
    /// Peek, consume, or skip reached outside the occupied range.
    #[error("Range violation: {requested} bytes at offset {offset} with {buffered} buffered")]
    InvalidRange {
        /// Logical offset the operation started at.
        offset: usize,
        /// Bytes the operation asked for.
        requested: usize,
        /// Bytes actually buffered.
        buffered: usize,
    },
    /// Mapped routing was requested on a router built without a key mapper.
    #[error("Router has no key mapper configured")]
    RouterNoMapper,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SiftError>;
