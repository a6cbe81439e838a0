//! Textual rules: `regex`, `contains`, `enum`, `list` and `type`.

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use super::context::RowContext;
use super::kind::KindSource;
use super::params::{decode, default_true, flexible_bool, require_text, string_list};
use crate::core::Outcome;
use crate::dataset::find_list;
use crate::error::Result;
use crate::value::Value;

/// Compiles `pattern` with JavaScript-style `flags`.
///
/// Called once per planned rule; the compiled regex lives in the plan.
fn compile_regex(pattern: &str, flags: &str) -> std::result::Result<Regex, String> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            // global/unicode/sticky have no meaning for a single match test
            'g' | 'u' | 'y' => &mut builder,
            other => return Err(format!("unsupported regex flag '{other}'")),
        };
    }
    builder
        .build()
        .map_err(|e| format!("invalid regex pattern '{pattern}': {e}"))
}

/// The stringified value must match a regular expression.
#[derive(Debug, Clone)]
pub struct RegexCheck {
    pub pattern: String,
    regex: Regex,
}

#[derive(Deserialize)]
struct RegexParams {
    pattern: String,
    #[serde(default)]
    flags: Option<String>,
}

impl RegexCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let params: RegexParams = decode(source)?;
        require_text(source, "pattern", &params.pattern)?;
        let regex = compile_regex(&params.pattern, params.flags.as_deref().unwrap_or(""))
            .map_err(|e| source.configuration_error(e))?;
        Ok(Self {
            pattern: params.pattern,
            regex,
        })
    }

    pub fn validate(&self, column: &str, value: &Value) -> Outcome {
        let text = value.to_string();
        Outcome::check(self.regex.is_match(&text), || {
            format!("{column} value '{text}' does not match pattern {}", self.pattern)
        })
    }
}

impl PartialEq for RegexCheck {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.regex.as_str() == other.regex.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum MatchType {
    #[default]
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "starts-with", alias = "startsWith")]
    StartsWith,
    #[serde(rename = "ends-with", alias = "endsWith")]
    EndsWith,
}

/// Substring, prefix or suffix test.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainsCheck {
    pub search_string: String,
    #[serde(default)]
    pub match_type: MatchType,
    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub case_sensitive: bool,
}

impl ContainsCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let check: Self = decode(source)?;
        if check.search_string.is_empty() {
            return Err(source.configuration_error("contains requires parameter 'searchString'"));
        }
        Ok(check)
    }

    pub fn validate(&self, column: &str, value: &Value) -> Outcome {
        let text = value.to_string();
        let (haystack, needle) = if self.case_sensitive {
            (text.clone(), self.search_string.clone())
        } else {
            (text.to_lowercase(), self.search_string.to_lowercase())
        };
        let found = match self.match_type {
            MatchType::Contains => haystack.contains(&needle),
            MatchType::StartsWith => haystack.starts_with(&needle),
            MatchType::EndsWith => haystack.ends_with(&needle),
        };
        Outcome::check(found, || {
            let verb = match self.match_type {
                MatchType::Contains => "contain",
                MatchType::StartsWith => "start with",
                MatchType::EndsWith => "end with",
            };
            format!("{column} value '{text}' must {verb} '{}'", self.search_string)
        })
    }
}

/// The stringified value must be one of a fixed set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumCheck {
    #[serde(deserialize_with = "string_list")]
    pub allowed_values: Vec<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub case_insensitive: bool,
}

impl EnumCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let check: Self = decode(source)?;
        if check.allowed_values.is_empty() {
            return Err(source.configuration_error("enum requires at least one allowed value"));
        }
        Ok(check)
    }

    pub fn validate(&self, column: &str, value: &Value) -> Outcome {
        let candidate = value.to_string();
        let allowed = self.allowed_values.iter().any(|v| {
            if self.case_insensitive {
                v.to_lowercase() == candidate.to_lowercase()
            } else {
                *v == candidate
            }
        });
        Outcome::check(allowed, || {
            format!(
                "{column} value '{candidate}' is not one of: {}",
                self.allowed_values.join(", ")
            )
        })
    }
}

/// Membership in a named value list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCheck {
    pub list_id: String,
}

impl ListCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let check: Self = decode(source)?;
        require_text(source, "listId", &check.list_id)?;
        Ok(check)
    }

    pub fn validate(&self, column: &str, value: &Value, ctx: &RowContext<'_>) -> Result<Outcome> {
        let list = find_list(ctx.value_lists, &self.list_id).ok_or_else(|| {
            ctx.configuration_error(format!("value list '{}' not found", self.list_id))
        })?;
        let candidate = value.to_string();
        Ok(Outcome::check(list.contains(&candidate), || {
            format!(
                "{column} value '{candidate}' is not in list '{}'",
                list.name
            )
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    #[serde(alias = "integer", alias = "float")]
    Number,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "datetime")]
    Date,
    Object,
    Array,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::Object => "object",
            DataType::Array => "array",
        }
    }

    /// Numbers, booleans and dates accept their string spellings.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            DataType::String => matches!(value, Value::String(_)),
            DataType::Number => value.as_number().is_some(),
            DataType::Boolean => value.as_bool().is_some(),
            DataType::Date => value.as_date().is_some(),
            DataType::Object => matches!(value, Value::Object(_)),
            DataType::Array => matches!(value, Value::Array(_)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCheck {
    pub data_type: DataType,
}

impl TypeCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        decode(source)
    }

    pub fn validate(&self, column: &str, value: &Value) -> Outcome {
        Outcome::check(self.data_type.accepts(value), || {
            format!(
                "{column} must be of type {}, got {} '{value}'",
                self.data_type.as_str(),
                value.type_name()
            )
        })
    }
}
