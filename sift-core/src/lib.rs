//! Sift core - primitives for message-boundary recovery
//!
//! This crate provides the foundations the extraction engines build on,
//! with no I/O dependencies. It includes:
//!
//! - Fixed-capacity ring buffering with wraparound-transparent reads
//! - The packet descriptor contract protocols implement
//! - Error types

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod descriptor;
pub mod error;
pub mod ring;

// Re-export commonly used types
pub use descriptor::{HeaderField, PacketDescriptor, SizeField};
pub use error::{Result, SiftError};
pub use ring::RingBuffer;
