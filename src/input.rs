//! Batch input for the command-line driver.
//!
//! Batches come either from a frames file (one FrameSet, or an array of
//! them) or from per-source event files replayed tick by tick.

use crate::models::{Frame, FrameSet};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Deserialize)]
#[serde(untagged)]
enum FramesDocument {
    Many(Vec<FrameSet>),
    One(FrameSet),
}

/// Parse frames JSON: a single FrameSet object or an array of them.
pub fn parse_frame_sets(content: &str) -> Result<Vec<FrameSet>> {
    let document: FramesDocument = serde_json::from_str(content)
        .context("Expected a mapping of source id to frame, or an array of such mappings")?;

    Ok(match document {
        FramesDocument::Many(sets) => sets,
        FramesDocument::One(set) => vec![set],
    })
}

/// Load frames JSON from a file.
pub fn load_frame_sets(path: &Path) -> Result<Vec<FrameSet>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read frames file: {}", path.display()))?;

    let sets = parse_frame_sets(&content)
        .with_context(|| format!("Failed to parse frames file: {}", path.display()))?;
    debug!("Loaded {} batch(es) from {}", sets.len(), path.display());
    Ok(sets)
}

/// A `NAME=FILE` source argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub name: String,
    pub path: PathBuf,
}

impl FromStr for SourceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => Ok(Self {
                name: name.trim().to_string(),
                path: PathBuf::from(path.trim()),
            }),
            _ => Err(format!("Expected NAME=FILE, got '{}'", s)),
        }
    }
}

/// Replays per-source event lists as synchronized batches.
///
/// At tick `i` every source contributes a frame whose `meta` mapping is its
/// event `i`, wrapping around when a source runs out of events.
#[derive(Debug, Clone, Default)]
pub struct EventReplay {
    sources: Vec<(String, Vec<Map<String, Value>>)>,
}

impl EventReplay {
    /// Builds a replay. Sources without events are dropped.
    pub fn new(sources: Vec<(String, Vec<Map<String, Value>>)>) -> Self {
        let sources = sources
            .into_iter()
            .filter(|(name, events)| {
                if events.is_empty() {
                    warn!("Source '{}' has no events, skipping", name);
                }
                !events.is_empty()
            })
            .collect();
        Self { sources }
    }

    /// Load every source's JSON event array.
    pub fn load(specs: &[SourceSpec]) -> Result<Self> {
        let mut sources = Vec::with_capacity(specs.len());

        for spec in specs {
            let content = std::fs::read_to_string(&spec.path)
                .with_context(|| format!("Failed to read events file: {}", spec.path.display()))?;
            let events = parse_events(&content)
                .with_context(|| format!("Failed to parse events file: {}", spec.path.display()))?;
            debug!("Source '{}': {} event(s)", spec.name, events.len());
            sources.push((spec.name.clone(), events));
        }

        Ok(Self::new(sources))
    }

    /// Number of ticks needed to play the longest event list once.
    pub fn default_ticks(&self) -> usize {
        self.sources
            .iter()
            .map(|(_, events)| events.len())
            .max()
            .unwrap_or(0)
    }

    /// The batch for one tick.
    pub fn frame_set(&self, tick: usize) -> FrameSet {
        self.sources
            .iter()
            .map(|(name, events)| {
                let event = events[tick % events.len()].clone();
                let mut data = Map::new();
                data.insert("meta".to_string(), Value::Object(event));
                (name.clone(), Frame::new(data))
            })
            .collect()
    }

    /// Batches for ticks `0..ticks`.
    pub fn batches(&self, ticks: usize) -> impl Iterator<Item = FrameSet> + '_ {
        (0..ticks).map(move |tick| self.frame_set(tick))
    }
}

fn parse_events(content: &str) -> Result<Vec<Map<String, Value>>> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Array(items) = value else {
        bail!("Events file must contain a JSON array of objects");
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(event) => Ok(event),
            other => bail!("Event {} is not an object: {}", i, other),
        })
        .collect()
}
