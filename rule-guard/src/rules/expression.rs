//! Expression-backed rules: `formula`, `javascript-formula`, `custom` and
//! `math-operation`.

use serde::Deserialize;

use super::context::RowContext;
use super::kind::KindSource;
use super::params::{decode, optional_text, require_text, string_list};
use crate::aggregation::AggregationConfig;
use crate::core::Outcome;
use crate::error::{GuardError, Result};
use crate::expr::{Dialect, EvalContext, EvalError, Evaluated, Expression};
use crate::logging::truncate_field;
use crate::value::{format_number, CompareOp, Value};

/// Tolerance for `equals` / `not-equals` on computed numbers.
const EPSILON: f64 = 1e-9;
/// Longest formula text quoted back in a configuration error.
const QUOTED_FORMULA_LENGTH: usize = 120;

fn compile(source: &KindSource<'_>, text: &str, dialect: Dialect) -> Result<Expression> {
    Expression::compile(text, dialect).map_err(|e| {
        source.configuration_error(format!(
            "invalid expression '{}': {e}",
            truncate_field(text.trim(), QUOTED_FORMULA_LENGTH)
        ))
    })
}

/// Table-aware formula with optional aggregations.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaCheck {
    pub expression: Expression,
    pub operator: Option<CompareOp>,
    pub expected: Value,
    pub aggregations: Vec<AggregationConfig>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormulaParams {
    #[serde(alias = "expression")]
    formula: String,
    #[serde(default)]
    operator: Option<CompareOp>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    aggregations: Vec<AggregationConfig>,
}

impl FormulaCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let params: FormulaParams = decode(source)?;
        require_text(source, "formula", &params.formula)?;
        Ok(Self {
            expression: compile(source, &params.formula, Dialect::Formula)?,
            operator: params.operator,
            expected: params.value,
            aggregations: params.aggregations,
        })
    }

    /// Turns the computed result into a verdict-bearing value.
    fn judge(&self, result: Evaluated) -> std::result::Result<Evaluated, EvalError> {
        if self.expression.is_predicate() {
            return Ok(result);
        }
        match self.operator {
            Some(op) if !self.expected.is_null() => {
                let expected = self.expected.clone();
                result.map(|v| Ok(Value::Bool(op.apply(&v, &expected))))
            }
            _ => result.map(|v| {
                Ok(Value::Bool(match v {
                    Value::Bool(b) => b,
                    other => match other.as_number() {
                        Some(n) => n > 0.0,
                        None => other.truthy(),
                    },
                }))
            }),
        }
    }

    pub fn validate(&self, ctx: &RowContext<'_>) -> Result<Outcome> {
        let eval_ctx = EvalContext::new(ctx.row).with_scope(ctx.scope(&self.aggregations));
        let result = self.expression.evaluate(&eval_ctx)?;
        let rendered = result.describe();
        let verdict = self.judge(result)?.verdict();
        Ok(Outcome::check(verdict, || match self.operator {
            Some(op) if !self.expression.is_predicate() && !self.expected.is_null() => format!(
                "Formula '{}' evaluated to {rendered}, expected {} {}",
                self.expression.source(),
                op.describe(),
                self.expected
            ),
            _ => format!(
                "Formula '{}' evaluated to {rendered}",
                self.expression.source()
            ),
        }))
    }
}

/// Row-scoped boolean formula (`javascript-formula`).
#[derive(Debug, Clone, PartialEq)]
pub struct RowFormulaCheck {
    pub expression: Expression,
}

#[derive(Deserialize)]
struct RowFormulaParams {
    #[serde(alias = "expression")]
    formula: String,
}

impl RowFormulaCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let params: RowFormulaParams = decode(source)?;
        require_text(source, "formula", &params.formula)?;
        Ok(Self {
            expression: compile(source, &params.formula, Dialect::Row)?,
        })
    }

    pub fn validate(&self, ctx: &RowContext<'_>) -> Result<Outcome> {
        let verdict = self.expression.evaluate(&EvalContext::new(ctx.row))?.verdict();
        Ok(Outcome::check(verdict, || {
            format!("Formula '{}' is not satisfied", self.expression.source())
        }))
    }
}

/// Row-dialect predicate with `value` bound to the cell under test.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomCheck {
    pub expression: Expression,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomParams {
    function_body: String,
}

impl CustomCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let params: CustomParams = decode(source)?;
        require_text(source, "functionBody", &params.function_body)?;
        Ok(Self {
            expression: compile(source, &params.function_body, Dialect::Row)?,
        })
    }

    pub fn validate(&self, column: &str, value: &Value, ctx: &RowContext<'_>) -> Result<Outcome> {
        let eval_ctx = EvalContext::new(ctx.row).with_value(value);
        let verdict = self.expression.evaluate(&eval_ctx)?.verdict();
        Ok(Outcome::check(verdict, || {
            format!("{column} value '{value}' failed custom validation")
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathOperation {
    #[serde(alias = "+")]
    Add,
    #[serde(alias = "-")]
    Subtract,
    #[serde(alias = "*")]
    Multiply,
    #[serde(alias = "/")]
    Divide,
}

impl MathOperation {
    pub fn symbol(&self) -> &'static str {
        match self {
            MathOperation::Add => "+",
            MathOperation::Subtract => "-",
            MathOperation::Multiply => "*",
            MathOperation::Divide => "/",
        }
    }

    fn apply(&self, acc: f64, next: f64) -> std::result::Result<f64, EvalError> {
        match self {
            MathOperation::Add => Ok(acc + next),
            MathOperation::Subtract => Ok(acc - next),
            MathOperation::Multiply => Ok(acc * next),
            MathOperation::Divide if next == 0.0 => Err(EvalError::DivisionByZero),
            MathOperation::Divide => Ok(acc / next),
        }
    }
}

/// What the computed result is compared against.
#[derive(Debug, Clone, PartialEq)]
pub enum MathTarget {
    Value(f64),
    Column(String),
}

/// Folds operand columns with one operation and compares the result.
#[derive(Debug, Clone, PartialEq)]
pub struct MathOperationCheck {
    pub operation: MathOperation,
    pub operands: Vec<String>,
    pub operator: CompareOp,
    pub target: MathTarget,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MathParams {
    operation: MathOperation,
    #[serde(default, deserialize_with = "string_list")]
    columns: Vec<String>,
    #[serde(default)]
    operator: Option<CompareOp>,
    #[serde(default)]
    value: Value,
    #[serde(default, deserialize_with = "optional_text")]
    compare_column: Option<String>,
}

impl MathOperationCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let params: MathParams = decode(source)?;
        let operands = if params.columns.is_empty() {
            std::iter::once(source.column)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .chain(source.secondary_columns.iter().cloned())
                .collect()
        } else {
            params.columns
        };
        if operands.len() < 2 {
            return Err(source.configuration_error(format!(
                "math-operation needs at least two operand columns, got {}",
                operands.len()
            )));
        }

        let target = match (params.value.is_absent(), params.compare_column) {
            (false, _) => MathTarget::Value(params.value.as_number().ok_or_else(|| {
                source.configuration_error(format!(
                    "math-operation 'value' must be numeric, got '{}'",
                    params.value
                ))
            })?),
            (true, Some(column)) => MathTarget::Column(column),
            (true, None) => {
                return Err(source.configuration_error(
                    "math-operation requires 'value' or 'compareColumn'",
                ))
            }
        };

        Ok(Self {
            operation: params.operation,
            operands,
            operator: params.operator.unwrap_or(CompareOp::Eq),
            target,
        })
    }

    fn describe_operands(&self) -> String {
        self.operands.join(&format!(" {} ", self.operation.symbol()))
    }

    pub fn validate(&self, ctx: &RowContext<'_>) -> Result<Outcome> {
        let mut numbers = Vec::with_capacity(self.operands.len());
        for column in &self.operands {
            let value = ctx.value(column);
            if value.is_absent() {
                return Ok(Outcome::pass());
            }
            match value.as_number() {
                Some(n) => numbers.push(n),
                None => {
                    return Ok(Outcome::fail(format!(
                        "Cannot compare non-numeric values: {column} is '{value}'"
                    ))
                    .on_column(column.clone()))
                }
            }
        }

        let (target, target_label) = match &self.target {
            MathTarget::Value(n) => (*n, format_number(*n)),
            MathTarget::Column(column) => {
                let value = ctx.value(column);
                if value.is_absent() {
                    return Ok(Outcome::pass());
                }
                let Some(n) = value.as_number() else {
                    return Ok(Outcome::fail(format!(
                        "Cannot compare non-numeric values: {column} is '{value}'"
                    ))
                    .on_column(column.clone()));
                };
                (n, format!("{column} ({})", format_number(n)))
            }
        };

        let mut iter = numbers.into_iter();
        let first = iter.next().unwrap_or_default();
        let result = iter.try_fold(first, |acc, n| self.operation.apply(acc, n))
            .map_err(GuardError::from)?;

        let ok = match self.operator {
            CompareOp::Eq => (result - target).abs() < EPSILON,
            CompareOp::Ne => (result - target).abs() >= EPSILON,
            op => result
                .partial_cmp(&target)
                .map(|ord| op.matches(ord))
                .unwrap_or(false),
        };
        Ok(Outcome::check(ok, || {
            format!(
                "{} = {} must be {} {target_label}",
                self.describe_operands(),
                format_number(result),
                self.operator.describe()
            )
        }))
    }
}
