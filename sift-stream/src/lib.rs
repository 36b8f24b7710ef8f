//! Sift stream layer - flow-controlled extraction and routing
//!
//! This crate wraps the extraction engines for concurrent use:
//!
//! - `CapacityGate` meters buffered bytes against a fixed permit budget
//! - `FlowControlledFramer` adds thread-safe admission with selectable
//!   congestion policies and receiver dispatch
//! - `Router` fans recovered payloads out to registered consumers

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod flow;
pub mod gate;
pub mod router;

// Re-export commonly used types
pub use flow::{CongestionPolicy, FlowControlledFramer, FlowOptions, PacketReceiver};
pub use gate::CapacityGate;
pub use router::{KeyMapper, RouteHandler, Router};
