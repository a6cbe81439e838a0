//! Safe expression language used by formula, custom and aggregation-filter
//! rules.
//!
//! Source text goes through a hand-written tokenizer ([`lexer`]), a
//! recursive-descent parser ([`parser`]) producing a closed [`Expr`] tree,
//! and a tree-walking evaluator ([`eval`]). Nothing is ever handed to a
//! dynamic code runner; the only callable functions are the aggregation
//! allow-list in [`AggregateFunction`](crate::aggregation::AggregateFunction).
//!
//! Two dialects share the grammar:
//!
//! - [`Dialect::Formula`]: bare identifiers are row fields or aggregation
//!   aliases; aggregation calls such as `SUM("amount", "status == 'paid'")`
//!   are allowed.
//! - [`Dialect::Row`]: row-scoped boolean expressions (`row.amount > 0`,
//!   `row["unit price"] * qty`). Function calls are rejected, an optional
//!   `return` prefix and trailing `;` are tolerated, and `value` is bound to
//!   the cell under test when a custom rule evaluates it.
//!
//! ```rust,ignore
//! use rule_guard::expr::{Dialect, EvalContext, Expression};
//!
//! let expr = Expression::compile("amount - refundAmount > 0", Dialect::Row)?;
//! let verdict = expr.evaluate(&EvalContext::new(&row))?.verdict();
//! ```

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

use thiserror::Error;

use crate::dataset::Row;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use eval::{EvalContext, Evaluated, TableScope};

/// Errors produced while parsing or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{function} expects {expected} arguments, got {found}")]
    Arity {
        function: String,
        expected: &'static str,
        found: usize,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Type error: {0}")]
    Type(String),

    #[error("Aggregation error: {0}")]
    Aggregation(String),
}

impl EvalError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
        }
    }
}

/// Which grammar features an expression may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Row fields, aliases and aggregation calls.
    Formula,
    /// Row fields only.
    Row,
}

/// A compiled expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    dialect: Dialect,
    ast: Expr,
}

impl Expression {
    /// Parses `source` in the given dialect.
    pub fn compile(source: &str, dialect: Dialect) -> Result<Self, EvalError> {
        let ast = parser::parse(source, dialect)?;
        Ok(Self {
            source: source.trim().to_string(),
            dialect,
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// True when the root node already produces a verdict (comparison,
    /// logical operator or negation).
    pub fn is_predicate(&self) -> bool {
        self.ast.is_predicate()
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Evaluated, EvalError> {
        eval::eval(&self.ast, ctx)
    }
}

/// Compiles `formula` in the formula dialect and evaluates it once.
pub fn evaluate(
    formula: &str,
    row: &Row,
    scope: Option<TableScope<'_>>,
) -> Result<Evaluated, EvalError> {
    let expression = Expression::compile(formula, Dialect::Formula)?;
    let mut ctx = EvalContext::new(row);
    if let Some(scope) = scope {
        ctx = ctx.with_scope(scope);
    }
    expression.evaluate(&ctx)
}
