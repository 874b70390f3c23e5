//! Aggregation engine.
//!
//! Resolves configured field paths across the frames of one batch, reduces
//! them, and assembles the output bundle.

pub mod aggregator;
pub mod forwarding;
pub mod ops;
pub mod path;

pub use aggregator::FrameAggregator;
pub use forwarding::ForwardingPolicy;
pub use ops::Operation;
pub use path::FieldPath;
