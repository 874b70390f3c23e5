//! Dot-separated field paths over nested data mappings.

use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::fmt;

/// A validated, pre-split field path such as `meta.count`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dot-separated path. Every segment must be non-empty.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let segments: Vec<String> = raw.split('.').map(String::from).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::InvalidPath {
                path: raw.to_string(),
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment, i.e. the top-level data key this path lives under.
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Final segment.
    pub fn leaf(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    /// Segments above the leaf.
    pub fn parent(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Looks up a nested value.
///
/// Returns `None` when a segment is missing, when an intermediate value is
/// not a mapping, or when the value found is JSON `null`.
pub fn get<'a, S: AsRef<str>>(data: &'a Map<String, Value>, segments: &[S]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = data.get(first.as_ref())?;

    for segment in rest {
        current = current.as_object()?.get(segment.as_ref())?;
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Writes `value` at the nested location, creating intermediate mappings
/// and replacing any non-mapping value standing in the way.
pub fn set<S: AsRef<str>>(data: &mut Map<String, Value>, segments: &[S], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            data.insert(leaf.as_ref().to_string(), value);
        }
        [head, rest @ ..] => {
            let child = data
                .entry(head.as_ref())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(inner) = child {
                set(inner, rest, value);
            }
        }
    }
}

/// [`get`] with a dotted string path.
pub fn get_path<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    get(data, &segments)
}

/// [`set`] with a dotted string path.
pub fn set_path(data: &mut Map<String, Value>, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    set(data, &segments, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_parse_splits_segments() {
        let path = FieldPath::parse("deeply.nested.field").unwrap();
        assert_eq!(path.segments(), ["deeply", "nested", "field"]);
        assert_eq!(path.root(), "deeply");
        assert_eq!(path.leaf(), "field");
        assert_eq!(path.parent(), ["deeply", "nested"]);

        let flat = FieldPath::parse("simple_field").unwrap();
        assert_eq!(flat.root(), "simple_field");
        assert_eq!(flat.leaf(), "simple_field");
        assert!(flat.parent().is_empty());
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        for bad in ["", "meta.", ".meta", "meta..count"] {
            assert_eq!(
                FieldPath::parse(bad),
                Err(ConfigError::InvalidPath {
                    path: bad.to_string()
                })
            );
        }
    }

    #[test]
    fn test_get_nested_and_absent() {
        let data = object(json!({
            "meta": {"count": 5, "label": "x", "gone": null},
            "flat": 3
        }));

        assert_eq!(get_path(&data, "meta.count"), Some(&json!(5)));
        assert_eq!(get_path(&data, "flat"), Some(&json!(3)));
        assert_eq!(get_path(&data, "meta.missing"), None);
        assert_eq!(get_path(&data, "nothing.here"), None);
        // Descending through a scalar is absent, not an error.
        assert_eq!(get_path(&data, "flat.deeper"), None);
        assert_eq!(get_path(&data, "meta.gone"), None);
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut data = Map::new();
        set_path(&mut data, "a.b.c", json!(1));
        set_path(&mut data, "a.b.d", json!(2));
        assert_eq!(Value::Object(data), json!({"a": {"b": {"c": 1, "d": 2}}}));
    }

    #[test]
    fn test_set_overwrites_non_mapping_intermediate() {
        let mut data = object(json!({"meta": 7, "keep": true}));
        set_path(&mut data, "meta.count", json!(8));
        assert_eq!(Value::Object(data), json!({"meta": {"count": 8}, "keep": true}));
    }

    #[test]
    fn test_set_overwrites_existing_leaf_in_place() {
        let mut data = object(json!({"meta": {"count": 5, "id": 1}}));
        set_path(&mut data, "meta.count", json!(8));
        let keys: Vec<_> = data["meta"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["count", "id"]);
        assert_eq!(data["meta"]["count"], json!(8));
    }
}
