//! Sift extraction engines - recovering message boundaries from byte streams
//!
//! Two engines sit on top of the `sift-core` ring buffer:
//!
//! - [`PacketFramer`]: three-phase scanning state machine for binary
//!   packet protocols described by a `PacketDescriptor`
//! - [`JsonStreamExtractor`]: incremental delimiter tracking that captures
//!   complete top-level JSON values out of unframed noise
//!
//! Both engines accept bytes in whatever chunk sizes the transport
//! produced and suspend cleanly when a unit is still incomplete.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod framer;
pub mod json;

// Re-export commonly used types
pub use framer::{PacketFramer, ProcessReport};
pub use json::{JsonStreamExtractor, JsonVerifier};
