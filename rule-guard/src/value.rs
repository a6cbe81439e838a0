//! Cell values and the coercion rules every comparison goes through.
//!
//! Rows are free-form JSON, so a [`Value`] can hold anything a JSON document
//! can plus a native date. Comparisons never look at the raw variants
//! directly; they call [`coerce_for_compare`], which picks the first
//! interpretation both operands support in the order boolean, numeric, date
//! and finally string.
//!
//! A value is *absent* when it is `null` or the empty string. Absent values
//! are never coerced to `0` or `false`; any comparison involving one fails
//! closed.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(NaiveDateTime),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

/// Shared `null` returned for missing columns.
pub(crate) static NULL: Value = Value::Null;

impl Value {
    /// Returns true for `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for `null` and the empty string.
    pub fn is_absent(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Short lowercase name of the variant, used in messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Numeric interpretation: finite numbers and strings that parse as one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// Date interpretation: native dates and ISO-8601-shaped strings.
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(*d),
            Value::String(s) => parse_iso_datetime(s),
            _ => None,
        }
    }

    /// Boolean interpretation: booleans and the strings `true` / `false`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Truthiness used by formula fallbacks and `&&` / `||`.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Date(_) | Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Key used for joins and distinct counting.
    ///
    /// Numbers and numeric strings share a canonical form so `100`,
    /// `100.0` and `"100"` collide. Absent values have no key.
    pub fn join_key(&self) -> Option<String> {
        if self.is_absent() {
            return None;
        }
        match self.as_number() {
            Some(n) => Some(format_number(n)),
            None => Some(self.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => f.write_str(&format_datetime(d)),
            Value::Array(_) | Value::Object(_) => {
                write!(f, "{}", serde_json::Value::from(self))
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(format_datetime(d)),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_json::Value::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(start_of_day(d))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Granularity used when two dates are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatePrecision {
    /// Calendar day; time of day is dropped.
    #[default]
    Day,
    /// Full timestamp.
    Exact,
}

impl DatePrecision {
    /// Picks `Exact` when time-aware comparison is requested.
    pub fn from_time_aware(time_aware: bool) -> Self {
        if time_aware {
            DatePrecision::Exact
        } else {
            DatePrecision::Day
        }
    }

    /// Normalizes a timestamp to this precision.
    pub fn truncate(self, dt: NaiveDateTime) -> NaiveDateTime {
        match self {
            DatePrecision::Day => start_of_day(dt.date()),
            DatePrecision::Exact => dt,
        }
    }
}

/// The interpretation chosen for a pair of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareKind {
    Boolean,
    Numeric,
    Date,
    String,
}

/// Two operands coerced to a common kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Boolean(bool, bool),
    Numeric(f64, f64),
    Date(NaiveDateTime, NaiveDateTime),
    Text(String, String),
}

impl Coerced {
    pub fn kind(&self) -> CompareKind {
        match self {
            Coerced::Boolean(..) => CompareKind::Boolean,
            Coerced::Numeric(..) => CompareKind::Numeric,
            Coerced::Date(..) => CompareKind::Date,
            Coerced::Text(..) => CompareKind::String,
        }
    }

    pub fn ordering(&self) -> Option<Ordering> {
        match self {
            Coerced::Boolean(a, b) => Some(a.cmp(b)),
            Coerced::Numeric(a, b) => a.partial_cmp(b),
            Coerced::Date(a, b) => Some(a.cmp(b)),
            Coerced::Text(a, b) => Some(a.cmp(b)),
        }
    }
}

/// Coerces two values to a common comparable kind.
///
/// Returns `None` when either operand is absent.
pub fn coerce_for_compare(a: &Value, b: &Value, precision: DatePrecision) -> Option<Coerced> {
    if a.is_absent() || b.is_absent() {
        return None;
    }
    if let (Value::Bool(x), Value::Bool(y)) = (a, b) {
        return Some(Coerced::Boolean(*x, *y));
    }
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return Some(Coerced::Numeric(x, y));
    }
    if let (Some(x), Some(y)) = (a.as_date(), b.as_date()) {
        return Some(Coerced::Date(precision.truncate(x), precision.truncate(y)));
    }
    Some(Coerced::Text(a.to_string(), b.to_string()))
}

/// Comparison operator shared by rules, filters and cross-table conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(
        rename = "equals",
        alias = "eq",
        alias = "=",
        alias = "==",
        alias = "==="
    )]
    Eq,
    #[serde(
        rename = "not-equals",
        alias = "ne",
        alias = "!=",
        alias = "!==",
        alias = "<>"
    )]
    Ne,
    #[serde(rename = "greater-than", alias = "gt", alias = ">")]
    Gt,
    #[serde(
        rename = "greater-than-equals",
        alias = "gte",
        alias = ">=",
        alias = "greater-than-or-equal"
    )]
    Gte,
    #[serde(rename = "less-than", alias = "lt", alias = "<")]
    Lt,
    #[serde(
        rename = "less-than-equals",
        alias = "lte",
        alias = "<=",
        alias = "less-than-or-equal"
    )]
    Lte,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    /// Phrase used in failure messages ("greater than or equal to").
    pub fn describe(&self) -> &'static str {
        match self {
            CompareOp::Eq => "equal to",
            CompareOp::Ne => "not equal to",
            CompareOp::Gt => "greater than",
            CompareOp::Gte => "greater than or equal to",
            CompareOp::Lt => "less than",
            CompareOp::Lte => "less than or equal to",
        }
    }

    pub fn matches(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
        }
    }

    /// Applies the operator with calendar-day date precision.
    pub fn apply(&self, left: &Value, right: &Value) -> bool {
        self.apply_with(left, right, DatePrecision::Day)
    }

    /// Applies the operator; absent operands fail closed.
    pub fn apply_with(&self, left: &Value, right: &Value, precision: DatePrecision) -> bool {
        coerce_for_compare(left, right, precision)
            .and_then(|c| c.ordering())
            .map(|ord| self.matches(ord))
            .unwrap_or(false)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Formats a number without a trailing `.0` when it is integral.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Parses a trimmed, finite number.
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parses an ISO-8601-shaped date or timestamp.
pub fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    // Every accepted shape starts with a four-digit year.
    if s.len() < 8 || !s.as_bytes()[..4].iter().all(u8::is_ascii_digit) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .map(start_of_day)
}

pub(crate) fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.num_seconds_from_midnight() == 0 && dt.nanosecond() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}
