//! Multi-condition rules joined with AND / OR.

use super::context::RowContext;
use super::kind::RuleKind;
use super::Rule;
use crate::core::{LogicalOperator, Outcome};
use crate::error::Result;

/// One planned condition and the operator joining it to the next one.
#[derive(Debug, Clone)]
pub struct ChainLink {
    pub column: String,
    pub kind: RuleKind,
    pub operator: LogicalOperator,
}

/// A rule's `columnConditions`, evaluated strictly left to right.
///
/// There is no precedence grouping: `[A(AND), B(OR), C]` is
/// `((A AND B) OR C)` and `[A(OR), B(AND), C]` is `((A OR B) AND C)`.
/// The operator attached to condition `i - 1` decides whether condition `i`
/// is evaluated at all.
#[derive(Debug, Clone, Default)]
pub struct ConditionChain {
    links: Vec<ChainLink>,
}

impl ConditionChain {
    pub fn new(links: Vec<ChainLink>) -> Self {
        Self { links }
    }

    /// Plans every condition of `rule`; the first bad condition fails the chain.
    pub fn from_rule(rule: &Rule) -> Result<Self> {
        let links = rule
            .column_conditions
            .iter()
            .map(|condition| {
                Ok(ChainLink {
                    column: condition.column.clone(),
                    kind: RuleKind::from_condition(rule, condition)?,
                    operator: condition.logical_operator.unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { links })
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Evaluates the chain for one row.
    ///
    /// The failing outcome carries the column of the condition that decided
    /// the verdict. An empty chain is valid.
    pub fn evaluate(&self, ctx: &RowContext<'_>) -> Result<Outcome> {
        let mut running = true;
        let mut failure: Option<Outcome> = None;

        for (i, link) in self.links.iter().enumerate() {
            if i > 0 {
                if let Some(verdict) = self.links[i - 1].operator.short_circuit(running) {
                    running = verdict;
                    continue;
                }
            }
            let outcome = link.kind.validate(&link.column, ctx)?;
            running = outcome.is_valid;
            if outcome.is_valid {
                failure = None;
            } else if failure.is_none() {
                let column = outcome.column.clone().unwrap_or_else(|| link.column.clone());
                failure = Some(outcome.on_column(column));
            }
        }

        if running {
            return Ok(Outcome::pass());
        }
        Ok(failure.unwrap_or_else(|| Outcome::fail("Column conditions not satisfied")))
    }
}
