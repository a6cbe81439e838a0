//! Tree-walking evaluator.

use std::sync::Arc;

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::EvalError;
use crate::aggregation::{aggregate, AggregateValue, AggregationCache, AggregationConfig, ResultHandling};
use crate::dataset::Row;
use crate::value::{format_number, Value};

/// Table-wide context for aggregation calls.
#[derive(Debug, Clone, Copy)]
pub struct TableScope<'a> {
    pub name: &'a str,
    pub rows: &'a [Row],
    /// Configured aggregations; matched by call site or alias.
    pub aggregations: &'a [AggregationConfig],
    pub cache: Option<&'a AggregationCache>,
}

impl<'a> TableScope<'a> {
    pub fn new(name: &'a str, rows: &'a [Row]) -> Self {
        Self {
            name,
            rows,
            aggregations: &[],
            cache: None,
        }
    }

    pub fn with_aggregations(mut self, aggregations: &'a [AggregationConfig]) -> Self {
        self.aggregations = aggregations;
        self
    }

    pub fn with_cache(mut self, cache: &'a AggregationCache) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// Everything an expression can see while it is evaluated.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub row: &'a Row,
    /// Bound to the identifier `value` (custom rules).
    pub value: Option<&'a Value>,
    pub scope: Option<TableScope<'a>>,
}

impl<'a> EvalContext<'a> {
    pub fn new(row: &'a Row) -> Self {
        Self {
            row,
            value: None,
            scope: None,
        }
    }

    pub fn with_value(mut self, value: &'a Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_scope(mut self, scope: TableScope<'a>) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Result of evaluating an expression.
///
/// Grouped aggregations stay vectors through arithmetic and comparisons;
/// [`Evaluated::verdict`] reduces them with the aggregation's
/// [`ResultHandling`].
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Scalar(Value),
    Groups {
        values: Vec<Value>,
        handling: ResultHandling,
    },
}

impl Evaluated {
    /// Truthiness of a scalar, or the reduced truthiness of every group.
    pub fn verdict(&self) -> bool {
        match self {
            Evaluated::Scalar(value) => value.truthy(),
            Evaluated::Groups { values, handling } => {
                let passed: Vec<bool> = values.iter().map(Value::truthy).collect();
                handling.reduce(&passed)
            }
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Evaluated::Scalar(value) => Some(value),
            Evaluated::Groups { .. } => None,
        }
    }

    /// Applies `f` to the scalar or to every group value.
    pub fn map<F>(self, mut f: F) -> Result<Evaluated, EvalError>
    where
        F: FnMut(Value) -> Result<Value, EvalError>,
    {
        match self {
            Evaluated::Scalar(value) => f(value).map(Evaluated::Scalar),
            Evaluated::Groups { values, handling } => Ok(Evaluated::Groups {
                values: values.into_iter().map(f).collect::<Result<_, _>>()?,
                handling,
            }),
        }
    }

    /// Short rendering for messages: the scalar, or `n groups`.
    pub fn describe(&self) -> String {
        match self {
            Evaluated::Scalar(value) => value.to_string(),
            Evaluated::Groups { values, .. } => format!("{} groups", values.len()),
        }
    }
}

pub(crate) fn eval(expr: &Expr, ctx: &EvalContext<'_>) -> Result<Evaluated, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(Evaluated::Scalar(value.clone())),
        Expr::Column(name) => resolve_column(name, ctx),
        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                match eval(item, ctx)? {
                    Evaluated::Scalar(value) => values.push(value),
                    Evaluated::Groups { .. } => {
                        return Err(EvalError::Type(
                            "grouped aggregations cannot appear inside a list".to_string(),
                        ))
                    }
                }
            }
            Ok(Evaluated::Scalar(Value::Array(values)))
        }
        Expr::Unary { op, operand } => eval(operand, ctx)?.map(|v| unary(*op, v)),
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            if !eval(left, ctx)?.verdict() {
                return Ok(Evaluated::Scalar(Value::Bool(false)));
            }
            Ok(Evaluated::Scalar(Value::Bool(eval(right, ctx)?.verdict())))
        }
        Expr::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => {
            if eval(left, ctx)?.verdict() {
                return Ok(Evaluated::Scalar(Value::Bool(true)));
            }
            Ok(Evaluated::Scalar(Value::Bool(eval(right, ctx)?.verdict())))
        }
        Expr::Binary {
            op: op @ (BinaryOp::Eq | BinaryOp::Ne),
            left,
            right,
        } if left.is_null_literal() || right.is_null_literal() => {
            // `x == null` tests absence instead of failing closed.
            let other = if left.is_null_literal() { right } else { left };
            let want_absent = *op == BinaryOp::Eq;
            eval(other, ctx)?.map(|v| Ok(Value::Bool(v.is_absent() == want_absent)))
        }
        Expr::Binary { op, left, right } => {
            let left = eval(left, ctx)?;
            let right = eval(right, ctx)?;
            combine(left, right, |a, b| binary(*op, a, b))
        }
        Expr::Aggregate(config) => aggregate_call(config, ctx),
    }
}

fn resolve_column(name: &str, ctx: &EvalContext<'_>) -> Result<Evaluated, EvalError> {
    if name == "value" {
        if let Some(value) = ctx.value {
            return Ok(Evaluated::Scalar(value.clone()));
        }
    }
    if ctx.row.contains(name) {
        return Ok(Evaluated::Scalar(ctx.row.get(name).clone()));
    }
    if let Some(scope) = ctx.scope {
        if let Some(config) = scope
            .aggregations
            .iter()
            .find(|c| c.alias.as_deref() == Some(name))
        {
            return aggregate_call(config, ctx);
        }
    }
    Ok(Evaluated::Scalar(Value::Null))
}

fn aggregate_call(config: &AggregationConfig, ctx: &EvalContext<'_>) -> Result<Evaluated, EvalError> {
    let scope = ctx.scope.ok_or_else(|| {
        EvalError::Aggregation(format!(
            "{} needs table context and cannot be used here",
            config.function.name()
        ))
    })?;
    let call_site = config.call_site();
    let config = scope
        .aggregations
        .iter()
        .find(|c| c.call_site() == call_site)
        .unwrap_or(config);

    let computed = match scope.cache {
        Some(cache) => cache.get_or_compute(scope.name, scope.rows, config)?,
        None => Arc::new(aggregate(scope.rows, config)?),
    };
    Ok(match computed.as_ref() {
        AggregateValue::Scalar(value) => Evaluated::Scalar(value.clone()),
        AggregateValue::Grouped(groups) => Evaluated::Groups {
            values: groups.iter().map(|g| g.value.clone()).collect(),
            handling: config.result_handling,
        },
    })
}

fn combine<F>(left: Evaluated, right: Evaluated, mut f: F) -> Result<Evaluated, EvalError>
where
    F: FnMut(Value, Value) -> Result<Value, EvalError>,
{
    match (left, right) {
        (Evaluated::Scalar(a), Evaluated::Scalar(b)) => f(a, b).map(Evaluated::Scalar),
        (Evaluated::Groups { values, handling }, Evaluated::Scalar(b)) => Ok(Evaluated::Groups {
            values: values
                .into_iter()
                .map(|a| f(a, b.clone()))
                .collect::<Result<_, _>>()?,
            handling,
        }),
        (Evaluated::Scalar(a), Evaluated::Groups { values, handling }) => Ok(Evaluated::Groups {
            values: values
                .into_iter()
                .map(|b| f(a.clone(), b))
                .collect::<Result<_, _>>()?,
            handling,
        }),
        (
            Evaluated::Groups { values: a, handling },
            Evaluated::Groups { values: b, .. },
        ) => {
            if a.len() != b.len() {
                return Err(EvalError::Type(format!(
                    "grouped operands have different group counts ({} vs {})",
                    a.len(),
                    b.len()
                )));
            }
            Ok(Evaluated::Groups {
                values: a
                    .into_iter()
                    .zip(b)
                    .map(|(x, y)| f(x, y))
                    .collect::<Result<_, _>>()?,
                handling,
            })
        }
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
        UnaryOp::Neg => {
            if value.is_absent() {
                return Ok(Value::Null);
            }
            value.as_number().map(|n| Value::Number(-n)).ok_or_else(|| {
                EvalError::Type(format!("cannot negate {} '{value}'", value.type_name()))
            })
        }
    }
}

fn binary(op: BinaryOp, a: Value, b: Value) -> Result<Value, EvalError> {
    if let Some(cmp) = op.compare_op() {
        return Ok(Value::Bool(cmp.apply(&a, &b)));
    }
    if a.is_absent() || b.is_absent() {
        return Ok(Value::Null);
    }
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => arithmetic(op, x, y),
        _ if op == BinaryOp::Add && (matches!(a, Value::String(_)) || matches!(b, Value::String(_))) => {
            Ok(Value::String(format!("{a}{b}")))
        }
        _ => Err(EvalError::Type(format!(
            "cannot apply '{}' to {} '{}' and {} '{}'",
            op.symbol(),
            a.type_name(),
            a,
            b.type_name(),
            b
        ))),
    }
}

fn arithmetic(op: BinaryOp, x: f64, y: f64) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div if y == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => x / y,
        BinaryOp::Rem if y == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Rem => x % y,
        other => {
            return Err(EvalError::Type(format!(
                "'{}' is not an arithmetic operator",
                other.symbol()
            )))
        }
    };
    if result.is_finite() {
        Ok(Value::Number(result))
    } else {
        Err(EvalError::Type(format!(
            "{} {} {} overflows",
            format_number(x),
            op.symbol(),
            format_number(y)
        )))
    }
}
