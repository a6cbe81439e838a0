//! Value comparisons: `equals` through `less-than-equals`, `range` and
//! `column-comparison`.

use serde::Deserialize;

use super::context::RowContext;
use super::kind::KindSource;
use super::params::{decode, default_true, flexible_bool, require_text};
use crate::core::Outcome;
use crate::error::Result;
use crate::value::{CompareOp, DatePrecision, Value};

fn non_numeric(column: &str, value: &Value, expected: &Value) -> Outcome {
    Outcome::fail(format!(
        "Cannot compare non-numeric values: {column} is '{value}', limit is '{expected}'"
    ))
}

/// Compares the cell against a configured value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueComparison {
    pub op: CompareOp,
    pub expected: Value,
    /// Ordering kinds insist on numeric operands.
    pub numeric: bool,
}

#[derive(Deserialize)]
struct ValueParams {
    value: Value,
}

impl ValueComparison {
    pub(crate) fn decode(source: &KindSource<'_>, op: CompareOp, numeric: bool) -> Result<Self> {
        let params: ValueParams = decode(source)?;
        if params.value.is_null() {
            return Err(source.configuration_error(format!(
                "{} requires parameter 'value'",
                source.rule_type
            )));
        }
        if numeric && params.value.as_number().is_none() {
            return Err(source.configuration_error(format!(
                "{} requires a numeric 'value', got '{}'",
                source.rule_type, params.value
            )));
        }
        Ok(Self {
            op,
            expected: params.value,
            numeric,
        })
    }

    pub fn validate(&self, column: &str, value: &Value) -> Outcome {
        if self.numeric && value.as_number().is_none() {
            return non_numeric(column, value, &self.expected);
        }
        Outcome::check(self.op.apply(value, &self.expected), || {
            format!(
                "{column} must be {} {}, got '{value}'",
                self.op.describe(),
                self.expected
            )
        })
    }
}

/// Numeric bounds; at least one of `min` / `max`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeCheck {
    #[serde(default)]
    pub min: Value,
    #[serde(default)]
    pub max: Value,
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub inclusive: bool,
}

impl RangeCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let check: Self = decode(source)?;
        if check.min.is_absent() && check.max.is_absent() {
            return Err(source.configuration_error("range requires 'min', 'max' or both"));
        }
        for (name, bound) in [("min", &check.min), ("max", &check.max)] {
            if !bound.is_absent() && bound.as_number().is_none() {
                return Err(source.configuration_error(format!(
                    "range '{name}' must be numeric, got '{bound}'"
                )));
            }
        }
        Ok(check)
    }

    pub fn validate(&self, column: &str, value: &Value) -> Outcome {
        let Some(n) = value.as_number() else {
            let limit = if self.min.is_absent() { &self.max } else { &self.min };
            return non_numeric(column, value, limit);
        };
        let (lower, upper) = if self.inclusive {
            (CompareOp::Gte, CompareOp::Lte)
        } else {
            (CompareOp::Gt, CompareOp::Lt)
        };
        let n = Value::Number(n);
        let above_min = self.min.is_absent() || lower.apply(&n, &self.min);
        let below_max = self.max.is_absent() || upper.apply(&n, &self.max);
        Outcome::check(above_min && below_max, || {
            let bounds = match (self.min.is_absent(), self.max.is_absent()) {
                (false, false) => format!("between {} and {}", self.min, self.max),
                (false, true) => format!("{} {}", lower.describe(), self.min),
                _ => format!("{} {}", upper.describe(), self.max),
            };
            let mode = if self.inclusive { "inclusive" } else { "exclusive" };
            format!("{column} must be {bounds} ({mode}), got '{value}'")
        })
    }
}

/// Compares two columns of the same row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnComparisonCheck {
    pub compare_column: String,
    pub operator: CompareOp,
    /// Pass when the compared column is empty.
    #[serde(default, deserialize_with = "flexible_bool")]
    pub allow_null: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub time_aware: bool,
}

impl ColumnComparisonCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let check: Self = decode(source)?;
        require_text(source, "compareColumn", &check.compare_column)?;
        Ok(check)
    }

    pub fn validate(&self, column: &str, value: &Value, ctx: &RowContext<'_>) -> Outcome {
        let other = ctx.value(&self.compare_column);
        if other.is_absent() {
            return Outcome::check(self.allow_null, || {
                format!(
                    "{} is empty; cannot compare {column} against it",
                    self.compare_column
                )
            });
        }
        let precision = DatePrecision::from_time_aware(self.time_aware || ctx.time_aware_dates);
        Outcome::check(self.operator.apply_with(value, other, precision), || {
            format!(
                "{column} ('{value}') must be {} {} ('{other}')",
                self.operator.describe(),
                self.compare_column
            )
        })
    }
}
