//! Test helpers for evaluating a single rule against hand-written rows.

use crate::core::{Outcome, Severity};
use crate::dataset::{Datasets, ValueList};
use crate::error::{GuardError, Result};
use crate::rules::{Rule, RowContext, RuleKind, RuleType};

/// Builds a failure-severity rule `r1` on table `t`.
///
/// Panics on an unknown rule type, which is a bug in the test itself.
pub fn rule(rule_type: &str, column: &str, params: serde_json::Value) -> Rule {
    let rule_type: RuleType = serde_json::from_value(serde_json::Value::String(rule_type.into()))
        .unwrap_or_else(|_| panic!("unknown rule type '{rule_type}'"));
    Rule::new("r1", "test rule", "t", column, rule_type)
        .with_params(params)
        .with_severity(Severity::Failure)
}

/// Plans `rule` and evaluates it against a one-row table `t`.
pub fn outcome(rule: &Rule, row: serde_json::Value) -> Result<Outcome> {
    outcome_with_lists(rule, row, &[])
}

/// Like [`outcome`], with value lists available to `list` rules.
pub fn outcome_with_lists(
    rule: &Rule,
    row: serde_json::Value,
    lists: &[ValueList],
) -> Result<Outcome> {
    let datasets = Datasets::from_json(serde_json::json!({ "t": [row] }))?;
    evaluate(rule, &datasets, 0, lists)
}

/// Plans `rule` and evaluates it against row `row_index` of table `t` in
/// `datasets`.
pub fn outcome_in(rule: &Rule, datasets: serde_json::Value, row_index: usize) -> Result<Outcome> {
    let datasets = Datasets::from_json(datasets)?;
    evaluate(rule, &datasets, row_index, &[])
}

fn evaluate(
    rule: &Rule,
    datasets: &Datasets,
    row_index: usize,
    lists: &[ValueList],
) -> Result<Outcome> {
    let kind = RuleKind::from_rule(rule)?;
    let table = datasets
        .table(&rule.table)
        .ok_or_else(|| GuardError::NotFound(rule.table.clone()))?;
    let row = table
        .rows()
        .get(row_index)
        .ok_or_else(|| GuardError::NotFound(format!("row {row_index}")))?;
    let ctx = RowContext::new(&rule.name, table, row_index, row, datasets).with_value_lists(lists);
    kind.validate(&rule.column, &ctx)
}
