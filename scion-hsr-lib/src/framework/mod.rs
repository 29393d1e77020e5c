//! Thin abstraction over the host packet framework.
//!
//! The real substrate (buffer allocation, frame scheduling, graph dispatch)
//! lives outside this crate; the stages only consume the surface modeled
//! here: packet buffers with a cursor and flags, batched frames, interface
//! registration handles and per-interface feature arcs.

mod buffer;
mod feature;
mod host;

pub use buffer::{BufFlags, Frame, PacketBuf};
pub use feature::FeatureArcs;
pub use host::{InProcessHost, InterfaceHost, INVALID_SW_IF_INDEX};
