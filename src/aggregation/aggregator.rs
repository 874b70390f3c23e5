//! Frame aggregation.
//!
//! This module merges the frames of one synchronized batch into a single
//! aggregated frame according to the configured field reductions.

use super::forwarding::ForwardingPolicy;
use super::path;
use crate::config::{AggregatorConfig, FieldAggregation};
use crate::error::AggregationError;
use crate::models::{Frame, FrameSet, OutputBundle};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Stateless batch aggregator around a validated config.
///
/// Holds nothing mutable, so one instance can serve batches from any number
/// of threads.
#[derive(Debug, Clone)]
pub struct FrameAggregator {
    config: AggregatorConfig,
    policy: ForwardingPolicy,
}

impl FrameAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        let policy = ForwardingPolicy::from(&config);
        Self { config, policy }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Aggregates one batch into an output bundle.
    ///
    /// Fails on the first field whose values cannot be reduced; nothing is
    /// returned for the batch in that case.
    pub fn process(&self, frames: &FrameSet) -> Result<OutputBundle, AggregationError> {
        let mut data = self.aggregate_fields(frames)?;

        let primary = frames.primary();
        self.policy
            .copy_extra_fields(primary, &self.config.aggregations, &mut data);

        let main = Frame {
            image: self.policy.image(primary),
            data,
        };

        let bundle = self.policy.bundle(main, frames);
        debug!(
            "Aggregated {} frame(s) into {} output topic(s)",
            frames.len(),
            bundle.len()
        );
        Ok(bundle)
    }

    /// Reduces every configured field, in configuration order, into a fresh
    /// data mapping. Fields absent from every frame are left out.
    pub fn aggregate_fields(
        &self,
        frames: &FrameSet,
    ) -> Result<Map<String, Value>, AggregationError> {
        let mut data = Map::new();

        for field in &self.config.aggregations {
            let Some(value) = self.aggregate_field(frames, field)? else {
                debug!("Field '{}' absent from every frame, skipping", field.path);
                continue;
            };

            let key = field.output_key(self.config.append_op_to_key);
            if self.config.debug {
                info!("{} ({}) -> {} = {}", field.path, field.op, key, value);
            } else {
                debug!("{} ({}) -> {} = {}", field.path, field.op, key, value);
            }

            let mut target: Vec<&str> = field.path.parent().iter().map(String::as_str).collect();
            target.push(&key);
            path::set(&mut data, &target, value);
        }

        Ok(data)
    }

    /// Reduces one field across the batch. `Ok(None)` means the field was
    /// absent from every frame.
    pub fn aggregate_field(
        &self,
        frames: &FrameSet,
        field: &FieldAggregation,
    ) -> Result<Option<Value>, AggregationError> {
        let values = collect_values(frames, field);
        if values.is_empty() {
            return Ok(None);
        }

        field.op.apply(field.path.as_str(), &values).map(Some)
    }
}

/// Present values for `field`, in frame order.
fn collect_values<'a>(frames: &'a FrameSet, field: &FieldAggregation) -> Vec<&'a Value> {
    frames
        .frames()
        .filter_map(|frame| path::get(&frame.data, field.path.segments()))
        .collect()
}
