//! AND/OR operators for chaining rule conditions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operator joining a condition to the next one in a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[default]
    #[serde(rename = "AND", alias = "and", alias = "&&")]
    And,
    #[serde(rename = "OR", alias = "or", alias = "||")]
    Or,
}

impl LogicalOperator {
    /// The verdict if the next condition is skipped, or `None` when the
    /// next condition has to be evaluated.
    ///
    /// `false AND x` stays false and `true OR x` stays true.
    pub fn short_circuit(&self, running: bool) -> Option<bool> {
        match (self, running) {
            (LogicalOperator::And, false) => Some(false),
            (LogicalOperator::Or, true) => Some(true),
            _ => None,
        }
    }

    pub fn combine(&self, running: bool, next: bool) -> bool {
        match self {
            LogicalOperator::And => running && next,
            LogicalOperator::Or => running || next,
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "AND"),
            LogicalOperator::Or => write!(f, "OR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_circuit() {
        assert_eq!(LogicalOperator::And.short_circuit(false), Some(false));
        assert_eq!(LogicalOperator::And.short_circuit(true), None);
        assert_eq!(LogicalOperator::Or.short_circuit(true), Some(true));
        assert_eq!(LogicalOperator::Or.short_circuit(false), None);
    }

    #[test]
    fn test_combine_truth_table() {
        for running in [true, false] {
            for next in [true, false] {
                assert_eq!(LogicalOperator::And.combine(running, next), running && next);
                assert_eq!(LogicalOperator::Or.combine(running, next), running || next);
            }
        }
    }

    #[test]
    fn test_serde_spellings() {
        let parse = |s: &str| serde_json::from_str::<LogicalOperator>(s).unwrap();
        assert_eq!(parse("\"AND\""), LogicalOperator::And);
        assert_eq!(parse("\"or\""), LogicalOperator::Or);
        assert_eq!(LogicalOperator::Or.to_string(), "OR");
    }
}
