//! Frame Aggregator - merge synchronized frames into one aggregated frame.
//!
//! Several producers emit a frame for the same logical time step; this crate
//! reduces configured nested fields across those frames and returns a single
//! `main` frame, optionally alongside the untouched source frames.
//!
//! ```
//! use frame_aggregator::{AggregatorConfig, Frame, FrameAggregator, FrameSet};
//! use serde_json::json;
//!
//! let config = AggregatorConfig::new([("meta.count", "sum")]).unwrap();
//! let aggregator = FrameAggregator::new(config);
//!
//! let frames = FrameSet::new()
//!     .with("source1", Frame::from_json(json!({"meta": {"count": 5}})))
//!     .with("source2", Frame::from_json(json!({"meta": {"count": 3}})));
//!
//! let bundle = aggregator.process(&frames).unwrap();
//! assert_eq!(bundle.main().data["meta"]["count_sum"], json!(8));
//! ```

pub mod aggregation;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod models;
pub mod output;

pub use aggregation::{FieldPath, ForwardingPolicy, FrameAggregator, Operation};
pub use config::{AggregationSpec, AggregatorConfig, FieldAggregation, Settings};
pub use error::{AggregationError, ConfigError};
pub use models::{Frame, FrameSet, Image, OutputBundle, MAIN_TOPIC};
