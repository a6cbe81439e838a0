//! Date rules: `date-before`, `date-after`, `date-between` and `date-format`.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::context::RowContext;
use super::kind::KindSource;
use super::params::{decode, default_true, flexible_bool, optional_text};
use crate::core::Outcome;
use crate::error::Result;
use crate::value::{parse_iso_datetime, start_of_day, DatePrecision, Value};

#[allow(clippy::expect_used)]
static ISO_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}([T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?)?$")
        .expect("Failed to compile ISO date regex")
});

#[allow(clippy::expect_used)]
static SLASHED_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}[/.-]\d{2}[/.-]\d{4}$").expect("Failed to compile slashed date regex")
});

/// A configured boundary date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRef {
    Fixed(NaiveDateTime),
    /// Start of the current UTC day, resolved at evaluation time
    Today,
    /// Current UTC instant, resolved at evaluation time
    Now,
}

impl DateRef {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "today" => Some(DateRef::Today),
            "now" => Some(DateRef::Now),
            _ => parse_iso_datetime(text).map(DateRef::Fixed),
        }
    }

    pub fn resolve(&self) -> NaiveDateTime {
        match self {
            DateRef::Fixed(dt) => *dt,
            DateRef::Today => start_of_day(Utc::now().date_naive()),
            DateRef::Now => Utc::now().naive_utc(),
        }
    }
}

fn date_param(source: &KindSource<'_>, name: &str, raw: Option<&str>) -> Result<Option<DateRef>> {
    match raw {
        None => Ok(None),
        Some(text) => DateRef::parse(text).map(Some).ok_or_else(|| {
            source.configuration_error(format!("'{name}' is not a valid date: '{text}'"))
        }),
    }
}

fn missing_date(source: &KindSource<'_>, name: &str) -> crate::error::GuardError {
    source.configuration_error(format!(
        "{} is required but '{name}' is not set",
        source.rule_type
    ))
}

fn render(dt: NaiveDateTime) -> String {
    Value::Date(dt).to_string()
}

fn invalid_date(column: &str, value: &Value) -> Outcome {
    Outcome::fail(format!("{column} value '{value}' is not a valid date"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateDirection {
    Before,
    After,
}

/// `date-before` / `date-after`.
#[derive(Debug, Clone, PartialEq)]
pub struct DateBoundCheck {
    pub direction: DateDirection,
    pub compare: Option<DateRef>,
    pub inclusive: bool,
    pub required: bool,
    pub time_aware: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoundParams {
    #[serde(default, deserialize_with = "optional_text")]
    compare_date: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    inclusive: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    required: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    time_aware: bool,
}

impl DateBoundCheck {
    pub(crate) fn decode(source: &KindSource<'_>, direction: DateDirection) -> Result<Self> {
        let params: BoundParams = decode(source)?;
        let compare = date_param(source, "compareDate", params.compare_date.as_deref())?;
        if compare.is_none() && params.required {
            return Err(missing_date(source, "compareDate"));
        }
        Ok(Self {
            direction,
            compare,
            inclusive: params.inclusive,
            required: params.required,
            time_aware: params.time_aware,
        })
    }

    pub fn validate(&self, column: &str, value: &Value, ctx: &RowContext<'_>) -> Outcome {
        if value.is_absent() {
            return Outcome::check(!self.required, || format!("{column} is required"));
        }
        let Some(compare) = self.compare else {
            return Outcome::pass();
        };
        let Some(date) = value.as_date() else {
            return invalid_date(column, value);
        };
        let precision = DatePrecision::from_time_aware(self.time_aware || ctx.time_aware_dates);
        let (date, limit) = (precision.truncate(date), precision.truncate(compare.resolve()));
        let ok = match (self.direction, self.inclusive) {
            (DateDirection::Before, true) => date <= limit,
            (DateDirection::Before, false) => date < limit,
            (DateDirection::After, true) => date >= limit,
            (DateDirection::After, false) => date > limit,
        };
        Outcome::check(ok, || {
            let relation = match (self.direction, self.inclusive) {
                (DateDirection::Before, true) => "on or before",
                (DateDirection::Before, false) => "before",
                (DateDirection::After, true) => "on or after",
                (DateDirection::After, false) => "after",
            };
            format!(
                "{column} must be {relation} {}, got '{value}'",
                render(limit)
            )
        })
    }
}

/// `date-between`; a missing bound leaves that side open.
#[derive(Debug, Clone, PartialEq)]
pub struct DateBetweenCheck {
    pub start: Option<DateRef>,
    pub end: Option<DateRef>,
    pub inclusive: bool,
    pub required: bool,
    pub time_aware: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BetweenParams {
    #[serde(default, deserialize_with = "optional_text")]
    start_date: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    end_date: Option<String>,
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    inclusive: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    required: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    time_aware: bool,
}

impl DateBetweenCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let params: BetweenParams = decode(source)?;
        let start = date_param(source, "startDate", params.start_date.as_deref())?;
        let end = date_param(source, "endDate", params.end_date.as_deref())?;
        if params.required {
            if start.is_none() {
                return Err(missing_date(source, "startDate"));
            }
            if end.is_none() {
                return Err(missing_date(source, "endDate"));
            }
        }
        if let (Some(DateRef::Fixed(s)), Some(DateRef::Fixed(e))) = (start, end) {
            if s > e {
                return Err(source.configuration_error(format!(
                    "startDate {} is after endDate {}",
                    render(s),
                    render(e)
                )));
            }
        }
        Ok(Self {
            start,
            end,
            inclusive: params.inclusive,
            required: params.required,
            time_aware: params.time_aware,
        })
    }

    pub fn validate(&self, column: &str, value: &Value, ctx: &RowContext<'_>) -> Outcome {
        if value.is_absent() {
            return Outcome::check(!self.required, || format!("{column} is required"));
        }
        if self.start.is_none() && self.end.is_none() {
            return Outcome::pass();
        }
        let Some(date) = value.as_date() else {
            return invalid_date(column, value);
        };
        let precision = DatePrecision::from_time_aware(self.time_aware || ctx.time_aware_dates);
        let date = precision.truncate(date);
        let start = self.start.map(|d| precision.truncate(d.resolve()));
        let end = self.end.map(|d| precision.truncate(d.resolve()));

        let after_start = start.map_or(true, |s| if self.inclusive { date >= s } else { date > s });
        let before_end = end.map_or(true, |e| if self.inclusive { date <= e } else { date < e });
        Outcome::check(after_start && before_end, || {
            let mode = if self.inclusive { "inclusive" } else { "exclusive" };
            let describe = |d: Option<NaiveDateTime>| d.map_or_else(|| "open".to_string(), render);
            format!(
                "{column} must be between {} and {} ({mode}), got '{value}'",
                describe(start),
                describe(end)
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    #[default]
    Iso,
    Us,
    Eu,
    Custom,
    Any,
}

/// `date-format`: the value must be spelled in the configured layout.
#[derive(Debug, Clone, PartialEq)]
pub struct DateFormatCheck {
    pub format: DateFormat,
    /// chrono format string translated from the `YYYY-MM-DD` token syntax
    pub custom: Option<String>,
    pub custom_label: Option<String>,
    pub required: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormatParams {
    #[serde(default)]
    format: DateFormat,
    #[serde(default, deserialize_with = "optional_text")]
    custom_format: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    required: bool,
}

/// Translates `YYYY MM DD HH mm ss` tokens into a chrono format string.
fn translate_tokens(pattern: &str) -> String {
    const TOKENS: [(&str, &str); 7] = [
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("HH", "%H"),
        ("mm", "%M"),
        ("ss", "%S"),
    ];
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for (token, spec) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }
    out
}

fn parses_with(text: &str, format: &str) -> bool {
    NaiveDateTime::parse_from_str(text, format).is_ok()
        || NaiveDate::parse_from_str(text, format).is_ok()
}

impl DateFormatCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let params: FormatParams = decode(source)?;
        let custom = match (params.format, &params.custom_format) {
            (DateFormat::Custom, None) => {
                return Err(source.configuration_error(
                    "date-format with format 'custom' requires parameter 'customFormat'",
                ))
            }
            (DateFormat::Custom, Some(pattern)) => Some(translate_tokens(pattern)),
            _ => None,
        };
        Ok(Self {
            format: params.format,
            custom,
            custom_label: params.custom_format,
            required: params.required,
        })
    }

    fn matches(&self, value: &Value) -> bool {
        let text = match value {
            Value::Date(_) => return matches!(self.format, DateFormat::Iso | DateFormat::Any),
            Value::String(s) => s.trim(),
            _ => return false,
        };
        let us = || SLASHED_SHAPE.is_match(text) && parses_with(&text.replace(['.', '-'], "/"), "%m/%d/%Y");
        let eu = || SLASHED_SHAPE.is_match(text) && parses_with(&text.replace(['.', '-'], "/"), "%d/%m/%Y");
        let iso = || ISO_SHAPE.is_match(text) && parse_iso_datetime(text).is_some();
        match self.format {
            DateFormat::Iso => iso(),
            DateFormat::Us => us(),
            DateFormat::Eu => eu(),
            DateFormat::Custom => self.custom.as_deref().map_or(false, |f| parses_with(text, f)),
            DateFormat::Any => iso() || parse_iso_datetime(text).is_some() || us() || eu(),
        }
    }

    pub fn validate(&self, column: &str, value: &Value) -> Outcome {
        if value.is_absent() {
            return Outcome::check(!self.required, || format!("{column} is required"));
        }
        Outcome::check(self.matches(value), || {
            let expected = match self.format {
                DateFormat::Iso => "ISO (YYYY-MM-DD)",
                DateFormat::Us => "US (MM/DD/YYYY)",
                DateFormat::Eu => "EU (DD/MM/YYYY)",
                DateFormat::Custom => self.custom_label.as_deref().unwrap_or("custom"),
                DateFormat::Any => "a recognizable date",
            };
            format!("{column} value '{value}' is not a valid date in format {expected}")
        })
    }
}
