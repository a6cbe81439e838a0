//! The closed set of planned rule kinds.
//!
//! A [`Rule`] carries its parameters as raw JSON. Planning turns the
//! `(ruleType, parameters)` pair into a [`RuleKind`], one variant per kind
//! with its typed parameter struct, so evaluation never touches JSON again.
//! Planning failures are configuration errors attributed to the rule.

use super::comparison::{ColumnComparisonCheck, RangeCheck, ValueComparison};
use super::context::RowContext;
use super::expression::{CustomCheck, FormulaCheck, MathOperationCheck, RowFormulaCheck};
use super::pattern::{ContainsCheck, EnumCheck, ListCheck, RegexCheck, TypeCheck};
use super::presence::{validate_required, DependencyCheck};
use super::reference::{CompositeReferenceCheck, CrossTableCheck, ReferenceIntegrityCheck};
use super::temporal::{DateBetweenCheck, DateBoundCheck, DateDirection, DateFormatCheck};
use super::{ColumnCondition, CrossTableCondition, Parameters, Rule, RuleType};
use crate::core::Outcome;
use crate::error::{GuardError, Result};
use crate::value::CompareOp;

/// Borrowed view of whatever is being planned: a whole rule or one of its
/// column conditions.
#[derive(Debug, Clone, Copy)]
pub struct KindSource<'a> {
    pub rule_name: &'a str,
    pub rule_type: RuleType,
    pub column: &'a str,
    pub secondary_columns: &'a [String],
    pub parameters: &'a Parameters,
    pub cross_table_conditions: &'a [CrossTableCondition],
}

impl<'a> KindSource<'a> {
    pub fn from_rule(rule: &'a Rule) -> Self {
        Self {
            rule_name: &rule.name,
            rule_type: rule.rule_type,
            column: &rule.column,
            secondary_columns: &rule.secondary_columns,
            parameters: &rule.parameters,
            cross_table_conditions: &rule.cross_table_conditions,
        }
    }

    pub fn from_condition(rule: &'a Rule, condition: &'a ColumnCondition) -> Self {
        Self {
            rule_name: &rule.name,
            rule_type: condition.rule_type,
            column: &condition.column,
            secondary_columns: &[],
            parameters: &condition.parameters,
            cross_table_conditions: &rule.cross_table_conditions,
        }
    }

    pub fn configuration_error(&self, message: impl Into<String>) -> GuardError {
        GuardError::configuration(self.rule_name, message)
    }
}

/// A rule kind with decoded parameters.
#[derive(Debug, Clone)]
pub enum RuleKind {
    Required,
    Compare(ValueComparison),
    Range(RangeCheck),
    Regex(RegexCheck),
    Type(TypeCheck),
    Enum(EnumCheck),
    List(ListCheck),
    Contains(ContainsCheck),
    Custom(CustomCheck),
    Dependency(DependencyCheck),
    DateBound(DateBoundCheck),
    DateBetween(DateBetweenCheck),
    DateFormat(DateFormatCheck),
    ColumnComparison(ColumnComparisonCheck),
    MathOperation(MathOperationCheck),
    CompositeReference(CompositeReferenceCheck),
    ReferenceIntegrity(ReferenceIntegrityCheck),
    Formula(FormulaCheck),
    JavascriptFormula(RowFormulaCheck),
    CrossTable(CrossTableCheck),
}

impl RuleKind {
    pub fn from_rule(rule: &Rule) -> Result<Self> {
        Self::decode(&KindSource::from_rule(rule))
    }

    pub fn from_condition(rule: &Rule, condition: &ColumnCondition) -> Result<Self> {
        Self::decode(&KindSource::from_condition(rule, condition))
    }

    pub fn decode(source: &KindSource<'_>) -> Result<Self> {
        Ok(match source.rule_type {
            RuleType::Required => RuleKind::Required,
            RuleType::Equals => RuleKind::Compare(ValueComparison::decode(source, CompareOp::Eq, false)?),
            RuleType::NotEquals => RuleKind::Compare(ValueComparison::decode(source, CompareOp::Ne, false)?),
            RuleType::GreaterThan => RuleKind::Compare(ValueComparison::decode(source, CompareOp::Gt, true)?),
            RuleType::GreaterThanEquals => {
                RuleKind::Compare(ValueComparison::decode(source, CompareOp::Gte, true)?)
            }
            RuleType::LessThan => RuleKind::Compare(ValueComparison::decode(source, CompareOp::Lt, true)?),
            RuleType::LessThanEquals => {
                RuleKind::Compare(ValueComparison::decode(source, CompareOp::Lte, true)?)
            }
            RuleType::Range => RuleKind::Range(RangeCheck::decode(source)?),
            RuleType::Regex => RuleKind::Regex(RegexCheck::decode(source)?),
            RuleType::Type => RuleKind::Type(TypeCheck::decode(source)?),
            RuleType::Enum => RuleKind::Enum(EnumCheck::decode(source)?),
            RuleType::List => RuleKind::List(ListCheck::decode(source)?),
            RuleType::Contains => RuleKind::Contains(ContainsCheck::decode(source)?),
            RuleType::Custom => RuleKind::Custom(CustomCheck::decode(source)?),
            RuleType::Dependency => RuleKind::Dependency(DependencyCheck::decode(source)?),
            RuleType::DateBefore => {
                RuleKind::DateBound(DateBoundCheck::decode(source, DateDirection::Before)?)
            }
            RuleType::DateAfter => {
                RuleKind::DateBound(DateBoundCheck::decode(source, DateDirection::After)?)
            }
            RuleType::DateBetween => RuleKind::DateBetween(DateBetweenCheck::decode(source)?),
            RuleType::DateFormat => RuleKind::DateFormat(DateFormatCheck::decode(source)?),
            RuleType::ColumnComparison => {
                RuleKind::ColumnComparison(ColumnComparisonCheck::decode(source)?)
            }
            RuleType::MathOperation => RuleKind::MathOperation(MathOperationCheck::decode(source)?),
            RuleType::CompositeReference => {
                RuleKind::CompositeReference(CompositeReferenceCheck::decode(source)?)
            }
            RuleType::ReferenceIntegrity => {
                RuleKind::ReferenceIntegrity(ReferenceIntegrityCheck::decode(source)?)
            }
            RuleType::Formula => RuleKind::Formula(FormulaCheck::decode(source)?),
            RuleType::JavascriptFormula => RuleKind::JavascriptFormula(RowFormulaCheck::decode(source)?),
            RuleType::CrossTable => {
                RuleKind::CrossTable(CrossTableCheck::new(source.cross_table_conditions.to_vec()))
            }
        })
    }

    /// Whether an absent primary value passes without running the check.
    pub fn passes_when_absent(&self) -> bool {
        match self {
            RuleKind::Required | RuleKind::Dependency(_) | RuleKind::CrossTable(_) => false,
            RuleKind::DateBound(check) => !check.required,
            RuleKind::DateBetween(check) => !check.required,
            RuleKind::DateFormat(check) => !check.required,
            _ => true,
        }
    }

    /// Evaluates the kind against `column` of the current row.
    pub fn validate(&self, column: &str, ctx: &RowContext<'_>) -> Result<Outcome> {
        let value = ctx.value(column);
        if !column.is_empty() && value.is_absent() && self.passes_when_absent() {
            return Ok(Outcome::pass());
        }

        Ok(match self {
            RuleKind::Required => validate_required(column, value),
            RuleKind::Compare(check) => check.validate(column, value),
            RuleKind::Range(check) => check.validate(column, value),
            RuleKind::Regex(check) => check.validate(column, value),
            RuleKind::Type(check) => check.validate(column, value),
            RuleKind::Enum(check) => check.validate(column, value),
            RuleKind::List(check) => check.validate(column, value, ctx)?,
            RuleKind::Contains(check) => check.validate(column, value),
            RuleKind::Custom(check) => check.validate(column, value, ctx)?,
            RuleKind::Dependency(check) => check.validate(column, value, ctx.row),
            RuleKind::DateBound(check) => check.validate(column, value, ctx),
            RuleKind::DateBetween(check) => check.validate(column, value, ctx),
            RuleKind::DateFormat(check) => check.validate(column, value),
            RuleKind::ColumnComparison(check) => check.validate(column, value, ctx),
            RuleKind::MathOperation(check) => check.validate(ctx)?,
            RuleKind::CompositeReference(check) => check.validate(ctx)?,
            RuleKind::ReferenceIntegrity(check) => check.validate(column, value, ctx)?,
            RuleKind::Formula(check) => check.validate(ctx)?,
            RuleKind::JavascriptFormula(check) => check.validate(ctx)?,
            RuleKind::CrossTable(check) => check.validate(ctx)?,
        })
    }
}
