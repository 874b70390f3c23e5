//! Configuration handling.
//!
//! [`Settings`] is the loosely typed form read from `.frame-aggregator.toml`,
//! environment variables and CLI flags. [`AggregatorConfig`] is the validated
//! form the engine runs with; it is built once and reused for every batch.

use crate::aggregation::{FieldPath, Operation};
use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".frame-aggregator.toml";

/// Root settings structure, as written by operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Copy non-aggregated top-level fields from the primary frame.
    #[serde(default = "default_true", deserialize_with = "loose_bool")]
    pub forward_extra_fields: bool,

    /// Copy the primary frame's image into the aggregated frame.
    #[serde(default, deserialize_with = "loose_bool")]
    pub forward_image: bool,

    /// Suffix output keys with `_<op>`.
    #[serde(default = "default_true", deserialize_with = "loose_bool")]
    pub append_op_to_key: bool,

    /// Forward every source frame unchanged next to `main`.
    #[serde(default = "default_true", deserialize_with = "loose_bool")]
    pub forward_upstream_data: bool,

    /// Verbose per-batch logging. Never changes output.
    #[serde(default, deserialize_with = "loose_bool")]
    pub debug: bool,

    /// Field path to operation name.
    #[serde(default)]
    pub aggregations: AggregationsSetting,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            forward_extra_fields: true,
            forward_image: false,
            append_op_to_key: true,
            forward_upstream_data: true,
            debug: false,
            aggregations: AggregationsSetting::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Aggregations as a table, or as a JSON-encoded string (the form used by
/// the `FILTER_AGGREGATIONS` environment variable). Any other value is kept
/// so validation can reject it with a proper error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregationsSetting {
    Table(Map<String, Value>),
    Json(String),
    Other(Value),
}

impl Default for AggregationsSetting {
    fn default() -> Self {
        AggregationsSetting::Table(Map::new())
    }
}

impl AggregationsSetting {
    /// Resolves to ordered `(path, operation name)` pairs without checking
    /// that the operation names exist.
    pub fn to_pairs(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let parsed;
        let table = match self {
            AggregationsSetting::Table(table) => table,
            AggregationsSetting::Json(raw) => {
                parsed = serde_json::from_str::<Value>(raw)
                    .map_err(|e| ConfigError::InvalidAggregationsJson(e.to_string()))?;
                parsed
                    .as_object()
                    .ok_or(ConfigError::AggregationsNotAMapping)?
            }
            AggregationsSetting::Other(_) => return Err(ConfigError::AggregationsNotAMapping),
        };

        table
            .iter()
            .map(|(path, op)| match op {
                Value::String(op) => Ok((path.clone(), op.clone())),
                _ => Err(ConfigError::OperationNotAString { path: path.clone() }),
            })
            .collect()
    }
}

/// Interprets an operator-supplied flag: true iff it is one of `true`, `1`,
/// `yes` (any case). Anything else is false.
pub fn parse_loose_bool(raw: &str) -> bool {
    matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn loose_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Loose::deserialize(deserializer)? {
        Loose::Bool(b) => b,
        Loose::Int(i) => i == 1,
        Loose::Text(s) => parse_loose_bool(&s),
    })
}

impl Settings {
    /// Load settings from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    /// Try to load settings from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_if_exists(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load settings from `path` when it exists.
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge these settings with CLI arguments (which carry env var values).
    ///
    /// Only values given explicitly on the command line or in the
    /// environment override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref raw) = args.aggregations {
            self.aggregations = AggregationsSetting::Json(raw.clone());
        }

        let flags = [
            (&args.forward_extra_fields, &mut self.forward_extra_fields),
            (&args.forward_image, &mut self.forward_image),
            (&args.append_op_to_key, &mut self.append_op_to_key),
            (&args.forward_upstream_data, &mut self.forward_upstream_data),
            (&args.debug, &mut self.debug),
        ];
        for (given, target) in flags {
            if let Some(raw) = given {
                *target = parse_loose_bool(raw);
            }
        }
    }

    /// Generate a default settings file content.
    pub fn default_toml() -> String {
        let settings = Settings::default();
        toml::to_string_pretty(&settings).unwrap_or_else(|_| String::new())
    }
}

/// One configured field reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAggregation {
    pub path: FieldPath,
    pub op: Operation,
}

impl FieldAggregation {
    /// Output key for this field: the leaf segment, suffixed with `_<op>`
    /// when `append_op` is set.
    pub fn output_key(&self, append_op: bool) -> String {
        if append_op {
            format!("{}_{}", self.path.leaf(), self.op)
        } else {
            self.path.leaf().to_string()
        }
    }
}

/// Validated field path to operation mapping, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationSpec {
    fields: Vec<FieldAggregation>,
}

impl AggregationSpec {
    /// Validates `(path, operation name)` pairs.
    ///
    /// A later entry for a path already present replaces the earlier one.
    pub fn parse<P, O, I>(pairs: I) -> Result<Self, ConfigError>
    where
        P: AsRef<str>,
        O: AsRef<str>,
        I: IntoIterator<Item = (P, O)>,
    {
        let mut fields: Vec<FieldAggregation> = Vec::new();

        for (path, op) in pairs {
            let (path, op) = (path.as_ref(), op.as_ref());
            let op: Operation = op.parse().map_err(|_| ConfigError::UnknownOperation {
                path: path.to_string(),
                op: op.to_string(),
            })?;
            let path = FieldPath::parse(path)?;

            match fields.iter_mut().find(|f| f.path == path) {
                Some(existing) => existing.op = op,
                None => fields.push(FieldAggregation { path, op }),
            }
        }

        Ok(Self { fields })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldAggregation> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether any configured path lives under top-level key `key`.
    pub fn targets_root(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.path.root() == key)
    }
}

impl<'a> IntoIterator for &'a AggregationSpec {
    type Item = &'a FieldAggregation;
    type IntoIter = std::slice::Iter<'a, FieldAggregation>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Validated engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub aggregations: AggregationSpec,
    pub forward_extra_fields: bool,
    pub forward_image: bool,
    pub append_op_to_key: bool,
    pub forward_upstream_data: bool,
    pub debug: bool,
}

impl AggregatorConfig {
    /// Builds a config with default forwarding flags.
    pub fn new<P, O, I>(aggregations: I) -> Result<Self, ConfigError>
    where
        P: AsRef<str>,
        O: AsRef<str>,
        I: IntoIterator<Item = (P, O)>,
    {
        Ok(Self::with_spec(AggregationSpec::parse(aggregations)?))
    }

    /// Wraps an already validated spec with default forwarding flags.
    pub fn with_spec(aggregations: AggregationSpec) -> Self {
        let defaults = Settings::default();
        Self {
            aggregations,
            forward_extra_fields: defaults.forward_extra_fields,
            forward_image: defaults.forward_image,
            append_op_to_key: defaults.append_op_to_key,
            forward_upstream_data: defaults.forward_upstream_data,
            debug: defaults.debug,
        }
    }

    /// Validates operator settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let pairs = settings.aggregations.to_pairs()?;
        Ok(Self {
            aggregations: AggregationSpec::parse(pairs)?,
            forward_extra_fields: settings.forward_extra_fields,
            forward_image: settings.forward_image,
            append_op_to_key: settings.append_op_to_key,
            forward_upstream_data: settings.forward_upstream_data,
            debug: settings.debug,
        })
    }

    pub fn forward_extra_fields(mut self, enabled: bool) -> Self {
        self.forward_extra_fields = enabled;
        self
    }

    pub fn forward_image(mut self, enabled: bool) -> Self {
        self.forward_image = enabled;
        self
    }

    pub fn append_op_to_key(mut self, enabled: bool) -> Self {
        self.append_op_to_key = enabled;
        self
    }

    pub fn forward_upstream_data(mut self, enabled: bool) -> Self {
        self.forward_upstream_data = enabled;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }
}

impl TryFrom<&Settings> for AggregatorConfig {
    type Error = ConfigError;

    fn try_from(settings: &Settings) -> Result<Self, Self::Error> {
        AggregatorConfig::from_settings(settings)
    }
}
