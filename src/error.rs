//! Error types.
//!
//! Configuration problems are raised once while building an
//! [`AggregatorConfig`](crate::config::AggregatorConfig); aggregation
//! problems are raised per batch and abort that batch.

use crate::aggregation::Operation;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while validating the aggregation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Operation name outside the supported set.
    #[error("Unsupported aggregation operation '{op}' for field '{path}'")]
    UnknownOperation { path: String, op: String },

    /// Empty path, or a path with an empty segment such as `meta..count`.
    #[error("Invalid field path '{path}': segments must be non-empty")]
    InvalidPath { path: String },

    /// Operation value was not a string.
    #[error("Aggregation operation for field '{path}' must be a string")]
    OperationNotAString { path: String },

    /// `aggregations` given as a string that is not valid JSON.
    #[error("Invalid aggregations JSON: {0}")]
    InvalidAggregationsJson(String),

    /// `aggregations` parsed, but is not a mapping.
    #[error("aggregations must be a dictionary of field path to operation")]
    AggregationsNotAMapping,
}

/// Errors raised while reducing one batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    /// A numeric operation met a value that is not a number.
    #[error("Cannot apply '{op}' to field '{path}': non-numeric value {value}")]
    Type {
        path: String,
        op: Operation,
        value: Value,
    },

    /// A float result overflowed to infinity or NaN.
    #[error("Operation '{op}' on field '{path}' produced a non-finite result")]
    NonFinite { path: String, op: Operation },
}

impl AggregationError {
    /// Field path the error refers to.
    pub fn path(&self) -> &str {
        match self {
            AggregationError::Type { path, .. } | AggregationError::NonFinite { path, .. } => path,
        }
    }
}
