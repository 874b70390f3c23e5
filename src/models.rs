//! Data models for the frame aggregator.
//!
//! This module contains the structures that flow through the engine:
//! per-producer [`Frame`]s, the ordered [`FrameSet`] for one batch, and the
//! [`OutputBundle`] handed back to the host.

use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Key of the aggregated frame in every [`OutputBundle`].
pub const MAIN_TOPIC: &str = "main";

/// Image payload carried alongside frame data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Raw image bytes (base64 on the JSON boundary).
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    /// Pixel format tag such as `BGR` or `RGB`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Image {
    pub fn new(bytes: Vec<u8>, format: impl Into<String>) -> Self {
        Self {
            bytes,
            format: Some(format.into()),
        }
    }
}

/// One producer's contribution to a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Optional image payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
    /// Nested, insertion-ordered data mapping.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Frame {
    /// Creates a data-only frame.
    pub fn new(data: Map<String, Value>) -> Self {
        Self { image: None, data }
    }

    /// Creates a data-only frame from a JSON object.
    ///
    /// Any non-object value yields an empty data mapping.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(data) => Self::new(data),
            _ => Self::default(),
        }
    }

    /// Attaches an image payload.
    pub fn with_image(mut self, image: Image) -> Self {
        self.image = Some(image);
        self
    }

    /// Returns the image format tag, if any.
    pub fn format(&self) -> Option<&str> {
        self.image.as_ref().and_then(|i| i.format.as_deref())
    }
}

/// One synchronized batch: frames keyed by source id, in registration order.
///
/// The first entry is the primary frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSet {
    entries: Vec<(String, Frame)>,
}

impl FrameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame. A repeated source id replaces the earlier frame in place.
    pub fn push(&mut self, source: impl Into<String>, frame: Frame) {
        let source = source.into();
        match self.entries.iter_mut().find(|(id, _)| *id == source) {
            Some((_, existing)) => *existing = frame,
            None => self.entries.push((source, frame)),
        }
    }

    /// Builder form of [`FrameSet::push`].
    pub fn with(mut self, source: impl Into<String>, frame: Frame) -> Self {
        self.push(source, frame);
        self
    }

    /// The primary (first) frame.
    pub fn primary(&self) -> Option<&Frame> {
        self.entries.first().map(|(_, frame)| frame)
    }

    pub fn get(&self, source: &str) -> Option<&Frame> {
        self.entries
            .iter()
            .find(|(id, _)| id == source)
            .map(|(_, frame)| frame)
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.entries.iter().map(|(_, frame)| frame)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Frame)> {
        self.entries.iter().map(|(id, frame)| (id.as_str(), frame))
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Frame)> for FrameSet {
    fn from_iter<I: IntoIterator<Item = (S, Frame)>>(iter: I) -> Self {
        let mut set = FrameSet::new();
        for (source, frame) in iter {
            set.push(source, frame);
        }
        set
    }
}

impl Serialize for FrameSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for FrameSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FrameSetVisitor;

        impl<'de> Visitor<'de> for FrameSetVisitor {
            type Value = FrameSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of source id to frame")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FrameSet, A::Error> {
                let mut set = FrameSet::new();
                while let Some((source, frame)) = map.next_entry::<String, Option<Frame>>()? {
                    match frame {
                        Some(frame) => set.push(source, frame),
                        None => debug!("Dropping source '{}' with no frame", source),
                    }
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(FrameSetVisitor)
    }
}

/// Result of one batch: the aggregated `main` frame first, then any
/// forwarded upstream frames.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBundle {
    entries: Vec<(String, Frame)>,
}

impl OutputBundle {
    /// Creates a bundle holding only the aggregated frame.
    pub fn new(main: Frame) -> Self {
        Self {
            entries: vec![(MAIN_TOPIC.to_string(), main)],
        }
    }

    /// Adds a forwarded frame. Returns `false` if the key is already taken.
    pub fn insert(&mut self, key: impl Into<String>, frame: Frame) -> bool {
        let key = key.into();
        if self.entries.iter().any(|(existing, _)| *existing == key) {
            return false;
        }
        self.entries.push((key, frame));
        true
    }

    /// The aggregated frame.
    pub fn main(&self) -> &Frame {
        // `new` always seeds the main entry and `insert` never removes it.
        &self.entries[0].1
    }

    pub fn get(&self, key: &str) -> Option<&Frame> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, frame)| frame)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Frame)> {
        self.entries.iter().map(|(key, frame)| (key.as_str(), frame))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Serialize for OutputBundle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

mod base64_bytes {
    use super::BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(data: Value) -> Frame {
        Frame::from_json(data)
    }

    #[test]
    fn test_frame_set_keeps_registration_order() {
        let set = FrameSet::new()
            .with("cam_2", frame(json!({"n": 2})))
            .with("cam_1", frame(json!({"n": 1})));

        let ids: Vec<_> = set.source_ids().collect();
        assert_eq!(ids, vec!["cam_2", "cam_1"]);
        assert_eq!(set.primary().map(|f| &f.data["n"]), Some(&json!(2)));
    }

    #[test]
    fn test_frame_set_duplicate_source_replaces_in_place() {
        let set = FrameSet::new()
            .with("a", frame(json!({"n": 1})))
            .with("b", frame(json!({"n": 2})))
            .with("a", frame(json!({"n": 3})));

        assert_eq!(set.len(), 2);
        assert_eq!(set.source_ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(set.get("a").map(|f| &f.data["n"]), Some(&json!(3)));
    }

    #[test]
    fn test_frame_set_deserialize_skips_null_frames() {
        let set: FrameSet = serde_json::from_value(json!({
            "source1": null,
            "source2": {"data": {"meta": {"count": 1}}},
            "source3": {}
        }))
        .unwrap();

        assert_eq!(set.source_ids().collect::<Vec<_>>(), vec!["source2", "source3"]);
        assert!(set.get("source3").unwrap().data.is_empty());
    }

    #[test]
    fn test_image_base64_boundary() {
        let f = Frame::default().with_image(Image::new(vec![0, 1, 2, 255], "BGR"));
        let encoded = serde_json::to_value(&f).unwrap();
        assert_eq!(encoded["image"]["bytes"], json!("AAEC/w=="));
        assert_eq!(encoded["image"]["format"], json!("BGR"));

        let decoded: Frame = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, f);
        assert_eq!(decoded.format(), Some("BGR"));
    }

    #[test]
    fn test_output_bundle_main_first_and_unique_keys() {
        let mut bundle = OutputBundle::new(frame(json!({"x": 1})));
        assert!(bundle.insert("source1", Frame::default()));
        assert!(!bundle.insert(MAIN_TOPIC, Frame::default()));
        assert!(!bundle.insert("source1", Frame::default()));

        assert_eq!(bundle.keys().collect::<Vec<_>>(), vec!["main", "source1"]);
        assert_eq!(bundle.main().data["x"], json!(1));

        let serialized = serde_json::to_string(&bundle).unwrap();
        assert!(serialized.starts_with(r#"{"main":"#));
    }
}
