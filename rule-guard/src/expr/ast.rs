//! Expression tree.

use crate::aggregation::AggregationConfig;
use crate::value::{CompareOp, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// A row field; `amount`, `row.amount` and `row["amount"]` all land here.
    Column(String),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Aggregate(AggregationConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// The value-model operator behind a comparison node.
    pub fn compare_op(&self) -> Option<CompareOp> {
        match self {
            BinaryOp::Eq => Some(CompareOp::Eq),
            BinaryOp::Ne => Some(CompareOp::Ne),
            BinaryOp::Lt => Some(CompareOp::Lt),
            BinaryOp::Le => Some(CompareOp::Lte),
            BinaryOp::Gt => Some(CompareOp::Gt),
            BinaryOp::Ge => Some(CompareOp::Gte),
            _ => None,
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// True when evaluating this node yields a verdict rather than a quantity.
    pub fn is_predicate(&self) -> bool {
        match self {
            Expr::Binary { op, .. } => op.is_logical() || op.compare_op().is_some(),
            Expr::Unary { op, .. } => *op == UnaryOp::Not,
            _ => false,
        }
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, Expr::Literal(Value::Null))
    }

    /// Row fields referenced anywhere in the tree, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::List(items) => items.iter().for_each(|item| item.collect_columns(out)),
            Expr::Unary { operand, .. } => operand.collect_columns(out),
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Literal(_) | Expr::Aggregate(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_detection() {
        let cmp = Expr::binary(
            BinaryOp::Gt,
            Expr::Column("a".into()),
            Expr::Literal(Value::Number(0.0)),
        );
        assert!(cmp.is_predicate());
        assert!(Expr::unary(UnaryOp::Not, Expr::Column("a".into())).is_predicate());
        assert!(!Expr::unary(UnaryOp::Neg, Expr::Column("a".into())).is_predicate());
        assert!(!Expr::binary(
            BinaryOp::Add,
            Expr::Column("a".into()),
            Expr::Column("b".into())
        )
        .is_predicate());
    }

    #[test]
    fn test_columns_deduplicated() {
        let expr = Expr::binary(
            BinaryOp::And,
            Expr::binary(
                BinaryOp::Gt,
                Expr::Column("a".into()),
                Expr::Column("b".into()),
            ),
            Expr::binary(
                BinaryOp::Lt,
                Expr::Column("a".into()),
                Expr::Literal(Value::Number(5.0)),
            ),
        );
        assert_eq!(expr.columns(), vec!["a", "b"]);
    }
}
