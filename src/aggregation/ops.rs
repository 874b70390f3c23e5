//! Reduction operations.
//!
//! Every operation reduces the values present for one field across a batch
//! (absent values are already filtered out) into a single value.

use crate::error::{AggregationError, ConfigError};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Supported reduction operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Sum,
    Avg,
    Min,
    Max,
    Median,
    Std,
    Mode,
    Count,
    CountDistinct,
    Distinct,
    Any,
    All,
}

impl Operation {
    /// Every supported operation.
    pub const ALL: [Operation; 12] = [
        Operation::Sum,
        Operation::Avg,
        Operation::Min,
        Operation::Max,
        Operation::Median,
        Operation::Std,
        Operation::Mode,
        Operation::Count,
        Operation::CountDistinct,
        Operation::Distinct,
        Operation::Any,
        Operation::All,
    ];

    /// Configuration name, also used as the output key suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Sum => "sum",
            Operation::Avg => "avg",
            Operation::Min => "min",
            Operation::Max => "max",
            Operation::Median => "median",
            Operation::Std => "std",
            Operation::Mode => "mode",
            Operation::Count => "count",
            Operation::CountDistinct => "count_distinct",
            Operation::Distinct => "distinct",
            Operation::Any => "any",
            Operation::All => "all",
        }
    }

    /// Whether the operation only accepts numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Operation::Sum
                | Operation::Avg
                | Operation::Min
                | Operation::Max
                | Operation::Median
                | Operation::Std
        )
    }

    /// Reduces the present values for `path`.
    ///
    /// `values` must be non-empty; callers skip fields absent from every frame.
    pub fn apply(&self, path: &str, values: &[&Value]) -> Result<Value, AggregationError> {
        let op = *self;
        match op {
            Operation::Sum => sum(path, op, &numeric_values(path, op, values)?),
            Operation::Avg => float_value(path, op, mean(&numeric_values(path, op, values)?)),
            Operation::Min => Ok(extreme(&numeric_values(path, op, values)?, Ordering::Less)),
            Operation::Max => Ok(extreme(&numeric_values(path, op, values)?, Ordering::Greater)),
            Operation::Median => median(path, op, &numeric_values(path, op, values)?),
            Operation::Std => float_value(path, op, sample_std(&numeric_values(path, op, values)?)),
            Operation::Mode => Ok(mode(values)),
            Operation::Count => Ok(Value::from(values.len())),
            Operation::CountDistinct => Ok(Value::from(distinct(values).len())),
            Operation::Distinct => Ok(Value::Array(
                distinct(values).into_iter().cloned().collect(),
            )),
            Operation::Any => Ok(Value::Bool(values.iter().any(|v| truthy(v)))),
            Operation::All => Ok(Value::Bool(values.iter().all(|v| truthy(v)))),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownOperation {
                path: String::new(),
                op: s.to_string(),
            })
    }
}

/// A numeric input, kept next to the original value so min/max/median can
/// return it with its integer or float representation intact.
struct Numeric<'a> {
    value: &'a Value,
    number: &'a Number,
    float: f64,
}

fn numeric_values<'a>(
    path: &str,
    op: Operation,
    values: &[&'a Value],
) -> Result<Vec<Numeric<'a>>, AggregationError> {
    values
        .iter()
        .map(|&value| match value {
            Value::Number(number) => Ok(Numeric {
                value,
                number,
                float: number.as_f64().unwrap_or(f64::NAN),
            }),
            other => Err(AggregationError::Type {
                path: path.to_string(),
                op,
                value: other.clone(),
            }),
        })
        .collect()
}

fn float_value(path: &str, op: Operation, x: f64) -> Result<Value, AggregationError> {
    Number::from_f64(x)
        .map(Value::Number)
        .ok_or_else(|| AggregationError::NonFinite {
            path: path.to_string(),
            op,
        })
}

/// Integer sum when every input is an integer and nothing overflows,
/// float sum otherwise.
fn sum(path: &str, op: Operation, numbers: &[Numeric<'_>]) -> Result<Value, AggregationError> {
    let integer_total = numbers.iter().try_fold(0i64, |total, n| {
        n.number.as_i64().and_then(|v| total.checked_add(v))
    });

    match integer_total {
        Some(total) => Ok(Value::from(total)),
        None => float_value(path, op, numbers.iter().map(|n| n.float).sum()),
    }
}

/// Arithmetic mean. Divides before summing when the plain sum overflows.
fn mean(numbers: &[Numeric<'_>]) -> f64 {
    let len = numbers.len() as f64;
    let total: f64 = numbers.iter().map(|n| n.float).sum();
    if total.is_finite() {
        total / len
    } else {
        numbers.iter().map(|n| n.float / len).sum()
    }
}

/// Exact order for integers, float order otherwise.
fn compare(a: &Numeric<'_>, b: &Numeric<'_>) -> Ordering {
    fn integer(number: &Number) -> Option<i128> {
        number
            .as_i64()
            .map(i128::from)
            .or_else(|| number.as_u64().map(i128::from))
    }

    match (integer(a.number), integer(b.number)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.float.partial_cmp(&b.float).unwrap_or(Ordering::Equal),
    }
}

/// First value that no later value beats in the `wanted` direction.
fn extreme(numbers: &[Numeric<'_>], wanted: Ordering) -> Value {
    let Some((mut best, rest)) = numbers.split_first() else {
        return Value::Null;
    };
    for candidate in rest {
        if compare(candidate, best) == wanted {
            best = candidate;
        }
    }
    best.value.clone()
}

fn median(path: &str, op: Operation, numbers: &[Numeric<'_>]) -> Result<Value, AggregationError> {
    let mut sorted: Vec<&Numeric<'_>> = numbers.iter().collect();
    sorted.sort_by(|a, b| compare(a, b));

    let mid = sorted.len() / 2;
    if sorted.is_empty() {
        Ok(Value::Null)
    } else if sorted.len() % 2 == 1 {
        Ok(sorted[mid].value.clone())
    } else {
        float_value(path, op, sorted[mid - 1].float / 2.0 + sorted[mid].float / 2.0)
    }
}

/// Sample standard deviation; zero for fewer than two values.
fn sample_std(numbers: &[Numeric<'_>]) -> f64 {
    if numbers.len() < 2 {
        return 0.0;
    }
    let avg = mean(numbers);
    let dof = (numbers.len() - 1) as f64;
    let squares: f64 = numbers.iter().map(|n| (n.float - avg).powi(2)).sum();
    if squares.is_finite() {
        return (squares / dof).sqrt();
    }

    // Squares overflow: scale deviations by the largest one first.
    let scale = numbers
        .iter()
        .map(|n| (n.float - avg).abs())
        .fold(0.0, f64::max);
    let scaled: f64 = numbers
        .iter()
        .map(|n| ((n.float - avg) / scale).powi(2))
        .sum();
    (scaled / dof).sqrt() * scale
}

/// Most frequent value; ties go to the value seen first.
fn mode(values: &[&Value]) -> Value {
    let mut counts: Vec<(&Value, usize)> = Vec::new();
    for &value in values {
        match counts.iter_mut().find(|(seen, _)| same_value(seen, value)) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    let Some((&(mut best, mut best_count), rest)) = counts.split_first() else {
        return Value::Null;
    };
    for &(candidate, count) in rest {
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best.clone()
}

/// Distinct values in first-seen order.
fn distinct<'a>(values: &[&'a Value]) -> Vec<&'a Value> {
    let mut unique: Vec<&Value> = Vec::new();
    for &value in values {
        if !unique.iter().any(|seen| same_value(seen, value)) {
            unique.push(value);
        }
    }
    unique
}

/// Equality that treats `1` and `1.0` as the same value.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(i), Some(j)) = (x.as_i64(), y.as_i64()) {
                i == j
            } else if let (Some(i), Some(j)) = (x.as_u64(), y.as_u64()) {
                i == j
            } else {
                x.as_f64() == y.as_f64()
            }
        }
        _ => a == b,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(op: Operation, values: &[Value]) -> Result<Value, AggregationError> {
        let refs: Vec<&Value> = values.iter().collect();
        op.apply("meta.field", &refs)
    }

    fn as_f64(value: Value) -> f64 {
        value.as_f64().unwrap()
    }

    #[test]
    fn test_parse_every_operation_name() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>(), Ok(op));
        }
        assert!("invalid_operation".parse::<Operation>().is_err());
        assert!("SUM".parse::<Operation>().is_err());
    }

    #[test]
    fn test_sum_keeps_integers() {
        assert_eq!(run(Operation::Sum, &[json!(5), json!(3)]).unwrap(), json!(8));
        assert_eq!(
            run(Operation::Sum, &[json!(10), json!(20), json!(15)]).unwrap(),
            json!(45)
        );
        assert_eq!(as_f64(run(Operation::Sum, &[json!(1), json!(0.5)]).unwrap()), 1.5);
    }

    #[test]
    fn test_sum_overflow_falls_back_to_float() {
        let result = run(Operation::Sum, &[json!(i64::MAX), json!(1)]).unwrap();
        assert!(result.is_f64());
    }

    #[test]
    fn test_avg() {
        assert_eq!(as_f64(run(Operation::Avg, &[json!(10), json!(20)]).unwrap()), 15.0);
        let avg = as_f64(run(Operation::Avg, &[json!(25.5), json!(24.8)]).unwrap());
        assert!((avg - 25.15).abs() < 1e-9);
    }

    #[test]
    fn test_min_max_preserve_representation() {
        let temps = [
            json!(25.5),
            json!(26.0),
            json!(24.8),
            json!(25.2),
            json!(23.0),
            json!(27.5),
            json!(22.0),
            json!(28.0),
        ];
        assert_eq!(run(Operation::Min, &temps).unwrap(), json!(22.0));
        assert_eq!(run(Operation::Max, &temps).unwrap(), json!(28.0));
        assert_eq!(
            run(Operation::Min, &[json!(1000), json!(1100), json!(950)]).unwrap(),
            json!(950)
        );
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(
            run(Operation::Median, &[json!(3), json!(1), json!(2)]).unwrap(),
            json!(2)
        );
        assert_eq!(
            as_f64(run(Operation::Median, &[json!(4), json!(1), json!(3), json!(2)]).unwrap()),
            2.5
        );
    }

    #[test]
    fn test_order_is_exact_for_large_integers() {
        let base: i64 = 1 << 53;
        assert_eq!(
            run(Operation::Max, &[json!(base), json!(base + 1)]).unwrap(),
            json!(base + 1)
        );
        assert_eq!(
            run(Operation::Min, &[json!(base + 1), json!(base)]).unwrap(),
            json!(base)
        );
        assert_eq!(
            run(Operation::Median, &[json!(base + 1), json!(base + 2), json!(base)]).unwrap(),
            json!(base + 1)
        );
        assert_eq!(
            run(Operation::Max, &[json!(-1), json!(u64::MAX), json!(i64::MAX)]).unwrap(),
            json!(u64::MAX)
        );
    }

    #[test]
    fn test_avg_and_std_near_float_limits() {
        let avg = as_f64(run(Operation::Avg, &[json!(1e308), json!(1e308)]).unwrap());
        assert!((avg - 1e308).abs() / 1e308 < 1e-12);

        let median = as_f64(run(Operation::Median, &[json!(1e308), json!(1.2e308)]).unwrap());
        assert!((median - 1.1e308).abs() / 1.1e308 < 1e-12);

        let std = as_f64(run(Operation::Std, &[json!(-1e308), json!(1e308)]).unwrap());
        let expected = 2f64.sqrt() * 1e308;
        assert!((std - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_std_sample_and_single_value() {
        let values = [2, 4, 4, 4, 5, 5, 7, 9].map(|v| json!(v));
        let std = as_f64(run(Operation::Std, &values).unwrap());
        assert!((std - 2.138089935299395).abs() < 1e-12);
        assert_eq!(as_f64(run(Operation::Std, &[json!(42)]).unwrap()), 0.0);
    }

    #[test]
    fn test_numeric_ops_reject_non_numbers() {
        for op in Operation::ALL.into_iter().filter(Operation::is_numeric) {
            let err = run(op, &[json!(1), json!("open")]).unwrap_err();
            assert_eq!(
                err,
                AggregationError::Type {
                    path: "meta.field".to_string(),
                    op,
                    value: json!("open"),
                }
            );
        }
        // Booleans are not numbers.
        assert!(run(Operation::Sum, &[json!(true), json!(1)]).is_err());
    }

    #[test]
    fn test_mode_tie_goes_to_first_seen() {
        assert_eq!(
            run(Operation::Mode, &[json!("b"), json!("a"), json!("a"), json!("b")]).unwrap(),
            json!("b")
        );
        assert_eq!(
            run(Operation::Mode, &[json!("x"), json!("y"), json!("y")]).unwrap(),
            json!("y")
        );
    }

    #[test]
    fn test_count_ignores_content() {
        assert_eq!(
            run(Operation::Count, &[json!(false), json!(""), json!({})]).unwrap(),
            json!(3)
        );
    }

    #[test]
    fn test_distinct_and_count_distinct_agree() {
        let values = [json!("open"), json!("closed"), json!("open"), json!(1), json!(1.0)];
        let distinct = run(Operation::Distinct, &values).unwrap();
        assert_eq!(distinct, json!(["open", "closed", 1]));
        assert_eq!(
            run(Operation::CountDistinct, &values).unwrap(),
            json!(distinct.as_array().unwrap().len())
        );
    }

    #[test]
    fn test_any_all_truthiness() {
        let mixed = [json!(true), json!(false), json!(true)];
        assert_eq!(run(Operation::Any, &mixed).unwrap(), json!(true));
        assert_eq!(run(Operation::All, &mixed).unwrap(), json!(false));

        assert_eq!(run(Operation::All, &[json!(1), json!("x"), json!([0])]).unwrap(), json!(true));
        assert_eq!(run(Operation::Any, &[json!(0), json!(""), json!([])]).unwrap(), json!(false));
    }
}
