//! Decides what besides the aggregated fields ends up in the output bundle.

use crate::config::{AggregationSpec, AggregatorConfig};
use crate::models::{Frame, FrameSet, Image, OutputBundle, MAIN_TOPIC};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Forwarding flags taken from the validated config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardingPolicy {
    pub forward_extra_fields: bool,
    pub forward_image: bool,
    pub forward_upstream_data: bool,
}

impl From<&AggregatorConfig> for ForwardingPolicy {
    fn from(config: &AggregatorConfig) -> Self {
        Self {
            forward_extra_fields: config.forward_extra_fields,
            forward_image: config.forward_image,
            forward_upstream_data: config.forward_upstream_data,
        }
    }
}

impl ForwardingPolicy {
    /// Copies top-level keys of the primary frame that no aggregation path
    /// targets. Existing keys in `data` are never overwritten.
    pub fn copy_extra_fields(
        &self,
        primary: Option<&Frame>,
        spec: &AggregationSpec,
        data: &mut Map<String, Value>,
    ) {
        let Some(primary) = primary.filter(|_| self.forward_extra_fields) else {
            return;
        };

        for (key, value) in &primary.data {
            if spec.targets_root(key) || data.contains_key(key) {
                continue;
            }
            debug!("Forwarding extra field '{}'", key);
            data.insert(key.clone(), value.clone());
        }
    }

    /// Image for the aggregated frame.
    pub fn image(&self, primary: Option<&Frame>) -> Option<Image> {
        if !self.forward_image {
            return None;
        }
        primary.and_then(|frame| frame.image.clone())
    }

    /// Wraps the aggregated frame and, if enabled, every source frame.
    pub fn bundle(&self, main: Frame, frames: &FrameSet) -> OutputBundle {
        let mut bundle = OutputBundle::new(main);
        if !self.forward_upstream_data {
            return bundle;
        }

        for (source, frame) in frames.iter() {
            if !bundle.insert(source, frame.clone()) {
                warn!(
                    "Not forwarding source '{}': key is reserved for the aggregated frame",
                    MAIN_TOPIC
                );
            }
        }
        bundle
    }
}
