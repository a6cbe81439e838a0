//! `required` and `dependency` rules.

use serde::Deserialize;

use super::kind::KindSource;
use super::params::{decode, require_text};
use crate::core::Outcome;
use crate::dataset::Row;
use crate::error::Result;
use crate::value::Value;

/// Fails when the value is absent.
pub fn validate_required(column: &str, value: &Value) -> Outcome {
    Outcome::check(!value.is_absent(), || format!("{column} is required"))
}

/// When to demand a value, based on another column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum DependencyCondition {
    #[default]
    #[serde(rename = "not-empty", alias = "notEmpty", alias = "exists")]
    NotEmpty,
    #[serde(rename = "empty", alias = "not-exists")]
    Empty,
    #[serde(rename = "equals")]
    Equals,
    #[serde(rename = "not-equals", alias = "notEquals")]
    NotEquals,
}

/// The column must be present whenever `depends_on_column` meets `condition`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyCheck {
    pub depends_on_column: String,
    #[serde(default)]
    pub condition: DependencyCondition,
    #[serde(default)]
    pub value: Value,
}

impl DependencyCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let check: Self = decode(source)?;
        require_text(source, "dependsOnColumn", &check.depends_on_column)?;
        if matches!(
            check.condition,
            DependencyCondition::Equals | DependencyCondition::NotEquals
        ) && check.value.is_absent()
        {
            return Err(source.configuration_error(
                "dependency conditions 'equals' and 'not-equals' require a value",
            ));
        }
        Ok(check)
    }

    fn triggered(&self, other: &Value) -> bool {
        match self.condition {
            DependencyCondition::NotEmpty => !other.is_absent(),
            DependencyCondition::Empty => other.is_absent(),
            DependencyCondition::Equals => other.join_key() == self.value.join_key(),
            DependencyCondition::NotEquals => other.join_key() != self.value.join_key(),
        }
    }

    fn describe_trigger(&self) -> String {
        let dep = &self.depends_on_column;
        match self.condition {
            DependencyCondition::NotEmpty => format!("{dep} is provided"),
            DependencyCondition::Empty => format!("{dep} is empty"),
            DependencyCondition::Equals => format!("{dep} is '{}'", self.value),
            DependencyCondition::NotEquals => format!("{dep} is not '{}'", self.value),
        }
    }

    pub fn validate(&self, column: &str, value: &Value, row: &Row) -> Outcome {
        if !self.triggered(row.get(&self.depends_on_column)) {
            return Outcome::pass();
        }
        Outcome::check(!value.is_absent(), || {
            format!("{column} is required when {}", self.describe_trigger())
        })
    }
}
