//! Rule definitions and the validator catalog.
//!
//! A [`Rule`] is plain data as it arrives from a rule editor or a JSON file.
//! Before a run the orchestrator plans each rule into a [`RuleKind`] (or a
//! [`ConditionChain`] when the rule has column conditions); the planned form
//! is what gets evaluated row by row.
//!
//! | module | kinds |
//! |---|---|
//! | [`presence`] | `required`, `dependency` |
//! | [`comparison`] | `equals` .. `less-than-equals`, `range`, `column-comparison` |
//! | [`pattern`] | `regex`, `type`, `enum`, `list`, `contains` |
//! | [`temporal`] | `date-before`, `date-after`, `date-between`, `date-format` |
//! | [`expression`] | `formula`, `javascript-formula`, `custom`, `math-operation` |
//! | [`reference`] | `reference-integrity`, `composite-reference`, `cross-table` |

pub mod combinator;
pub mod comparison;
pub mod context;
pub mod expression;
pub mod kind;
pub(crate) mod params;
pub mod pattern;
pub mod presence;
pub mod reference;
pub mod temporal;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{LogicalOperator, Severity};
use crate::value::{CompareOp, Value};

pub use combinator::{ChainLink, ConditionChain};
pub use context::RowContext;
pub use kind::{KindSource, RuleKind};

/// Raw rule parameters, decoded per kind at planning time.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

fn object(params: serde_json::Value) -> Parameters {
    match params {
        serde_json::Value::Object(map) => map,
        _ => Parameters::new(),
    }
}

/// Every supported rule kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleType {
    Required,
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEquals,
    LessThan,
    LessThanEquals,
    Range,
    Regex,
    Type,
    Enum,
    List,
    Contains,
    Custom,
    Dependency,
    DateBefore,
    DateAfter,
    DateBetween,
    DateFormat,
    ColumnComparison,
    MathOperation,
    Formula,
    JavascriptFormula,
    ReferenceIntegrity,
    CompositeReference,
    CrossTable,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Required => "required",
            RuleType::Equals => "equals",
            RuleType::NotEquals => "not-equals",
            RuleType::GreaterThan => "greater-than",
            RuleType::GreaterThanEquals => "greater-than-equals",
            RuleType::LessThan => "less-than",
            RuleType::LessThanEquals => "less-than-equals",
            RuleType::Range => "range",
            RuleType::Regex => "regex",
            RuleType::Type => "type",
            RuleType::Enum => "enum",
            RuleType::List => "list",
            RuleType::Contains => "contains",
            RuleType::Custom => "custom",
            RuleType::Dependency => "dependency",
            RuleType::DateBefore => "date-before",
            RuleType::DateAfter => "date-after",
            RuleType::DateBetween => "date-between",
            RuleType::DateFormat => "date-format",
            RuleType::ColumnComparison => "column-comparison",
            RuleType::MathOperation => "math-operation",
            RuleType::Formula => "formula",
            RuleType::JavascriptFormula => "javascript-formula",
            RuleType::ReferenceIntegrity => "reference-integrity",
            RuleType::CompositeReference => "composite-reference",
            RuleType::CrossTable => "cross-table",
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(
            self,
            RuleType::DateBefore | RuleType::DateAfter | RuleType::DateBetween | RuleType::DateFormat
        )
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-column condition inside a multi-condition rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnCondition {
    pub column: String,
    pub rule_type: RuleType,
    #[serde(default)]
    pub parameters: Parameters,
    /// Joins this condition to the next one; defaults to AND
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
}

impl ColumnCondition {
    pub fn new(column: impl Into<String>, rule_type: RuleType, parameters: serde_json::Value) -> Self {
        Self {
            column: column.into(),
            rule_type,
            parameters: object(parameters),
            logical_operator: None,
        }
    }

    pub fn then(mut self, operator: LogicalOperator) -> Self {
        self.logical_operator = Some(operator);
        self
    }
}

/// "Some row of `table` has `column <operator> value`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossTableCondition {
    pub table: String,
    pub column: String,
    pub operator: CompareOp,
    #[serde(default)]
    pub value: Value,
    /// Carried for round-tripping; conditions are always AND-combined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
}

impl CrossTableCondition {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        operator: CompareOp,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            operator,
            value: value.into(),
            logical_operator: None,
        }
    }
}

/// A data-quality rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub column: String,
    pub rule_type: RuleType,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_columns: Vec<String>,
    /// Supersedes `column`/`ruleType`/`parameters` when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_conditions: Vec<ColumnCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cross_table_conditions: Vec<CrossTableCondition>,
}

fn enabled_by_default() -> bool {
    true
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        rule_type: RuleType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            table: table.into(),
            column: column.into(),
            rule_type,
            parameters: Parameters::new(),
            severity: Severity::Failure,
            enabled: true,
            description: None,
            secondary_columns: Vec::new(),
            column_conditions: Vec::new(),
            cross_table_conditions: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Replaces all parameters; non-object JSON clears them.
    pub fn with_params(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = object(parameters);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_secondary_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secondary_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_condition(mut self, condition: ColumnCondition) -> Self {
        self.column_conditions.push(condition);
        self
    }

    pub fn with_cross_table_condition(mut self, condition: CrossTableCondition) -> Self {
        self.cross_table_conditions.push(condition);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn has_column_conditions(&self) -> bool {
        !self.column_conditions.is_empty()
    }

    pub fn has_cross_table_conditions(&self) -> bool {
        !self.cross_table_conditions.is_empty()
    }
}
