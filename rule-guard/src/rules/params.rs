//! Decoding of raw rule parameters into typed per-kind structs.
//!
//! Parameters arrive as loosely typed JSON from rule-builder forms, so the
//! helpers here accept `"true"` for `true`, a comma-separated string for a
//! list, and so on. Anything that still fails to decode becomes a
//! configuration error for the rule.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use super::kind::KindSource;
use crate::error::{GuardError, Result};
use crate::value::Value;

/// Deserializes the parameter map of `source` into `T`.
pub(crate) fn decode<T: DeserializeOwned>(source: &KindSource<'_>) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(source.parameters.clone())).map_err(|e| {
        GuardError::configuration(
            source.rule_name,
            format!("invalid parameters for {}: {e}", source.rule_type),
        )
    })
}

/// Fails with a configuration error when a required text parameter is blank.
pub(crate) fn require_text(source: &KindSource<'_>, name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GuardError::configuration(
            source.rule_name,
            format!("{} requires parameter '{name}'", source.rule_type),
        ));
    }
    Ok(())
}

pub(crate) fn default_true() -> bool {
    true
}

/// Accepts booleans, `"true"`/`"false"`, `1`/`0` and `null` (false).
pub(crate) fn flexible_bool<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<bool, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    match raw {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n != 0.0),
        Value::String(s) if s.is_empty() => Ok(false),
        other => other
            .as_bool()
            .ok_or_else(|| serde::de::Error::custom(format!("expected a boolean, got '{other}'"))),
    }
}

/// Accepts an array of values or a comma-separated string.
pub(crate) fn string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(Value::to_string).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect(),
        other => vec![other.to_string()],
    })
}

/// Accepts a string, or any scalar rendered as one; `null` and `""` are `None`.
pub(crate) fn optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok((!raw.is_absent()).then(|| raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        #[serde(default, deserialize_with = "flexible_bool")]
        inclusive: bool,
        #[serde(default = "default_true", deserialize_with = "flexible_bool")]
        case_sensitive: bool,
        #[serde(default, deserialize_with = "string_list")]
        allowed_values: Vec<String>,
        #[serde(default, deserialize_with = "optional_text")]
        compare_date: Option<String>,
    }

    fn sample(json: serde_json::Value) -> Sample {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let s = sample(json!({}));
        assert!(!s.inclusive);
        assert!(s.case_sensitive);
        assert!(s.allowed_values.is_empty());
        assert_eq!(s.compare_date, None);
    }

    #[test]
    fn test_lenient_values() {
        let s = sample(json!({
            "inclusive": "true",
            "caseSensitive": 0,
            "allowedValues": "a, b,,c",
            "compareDate": "2024-01-01"
        }));
        assert!(s.inclusive);
        assert!(!s.case_sensitive);
        assert_eq!(s.allowed_values, vec!["a", "b", "c"]);
        assert_eq!(s.compare_date.as_deref(), Some("2024-01-01"));

        let s = sample(json!({"allowedValues": [1, "x", true], "compareDate": ""}));
        assert_eq!(s.allowed_values, vec!["1", "x", "true"]);
        assert_eq!(s.compare_date, None);
    }

    #[test]
    fn test_rejects_garbage_bool() {
        assert!(serde_json::from_value::<Sample>(json!({"inclusive": "maybe"})).is_err());
    }
}
