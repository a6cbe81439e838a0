//! Prelude for commonly used types and traits in rule-guard.

pub use crate::aggregation::{AggregateFunction, AggregationConfig, ResultHandling};
pub use crate::core::{
    EngineConfig, LogicalOperator, ResultSeverity, Severity, ValidationEngine, ValidationReport,
    ValidationResult,
};
pub use crate::dataset::{Datasets, Row, Table, ValidationInput, ValueList};
pub use crate::error::{ErrorContext, GuardError, Result};
pub use crate::logging::LogConfig;
pub use crate::rules::{ColumnCondition, CrossTableCondition, Rule, RuleType};
pub use crate::value::{CompareOp, Value};
