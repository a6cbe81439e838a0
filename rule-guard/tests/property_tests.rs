//! Property-based tests for the validation engine.
//!
//! Each property drives the public engine API with generated rows and rules
//! and compares the verdicts against an independent model:
//!
//! - result cardinality: one result per enabled (rule, row), none for disabled
//! - date kinds: `date-after(exclusive)` is the negation of `date-before(inclusive)`
//! - numeric coercion between numeric strings and numbers
//! - the combinator's flat left-to-right AND/OR fold
//! - order independence of composite references
//! - `ResultHandling` reductions
//! - arithmetic in the expression evaluator

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rule_guard::aggregation::ResultHandling;
use rule_guard::expr::{evaluate, Evaluated};
use rule_guard::prelude::*;
use serde_json::json;

fn single(datasets: serde_json::Value, rule: serde_json::Value) -> ValidationResult {
    let report = ValidationEngine::new()
        .validate_json(&json!({"datasets": datasets, "rules": [rule]}).to_string())
        .unwrap();
    assert_eq!(report.results.len(), 1, "{:?}", report.results);
    report.results[0].clone()
}

fn day(offset: i64) -> String {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (base + Duration::days(offset)).format("%Y-%m-%d").to_string()
}

// ============================================================================
// Result cardinality
// ============================================================================

proptest! {
    #[test]
    fn test_one_result_per_enabled_rule_and_row(
        rows in 0usize..40,
        enabled in prop::collection::vec(any::<bool>(), 1..6)
    ) {
        let data: Vec<serde_json::Value> =
            (0..rows).map(|i| json!({"n": i, "s": format!("v{i}")})).collect();
        let rules: Vec<serde_json::Value> = enabled
            .iter()
            .enumerate()
            .map(|(i, on)| json!({
                "id": format!("r{i}"),
                "name": format!("rule {i}"),
                "table": "t",
                "column": if i % 2 == 0 { "n" } else { "s" },
                "ruleType": "required",
                "enabled": on
            }))
            .collect();

        let report = ValidationEngine::new()
            .validate_json(&json!({"datasets": {"t": data}, "rules": rules}).to_string())
            .unwrap();

        let active = enabled.iter().filter(|on| **on).count();
        prop_assert_eq!(report.results.len(), active * rows);
        prop_assert_eq!(report.metrics.rules_skipped, enabled.len() - active);
        for (i, on) in enabled.iter().enumerate() {
            if !on {
                let rule_id = format!("r{i}");
                prop_assert!(report.for_rule(&rule_id).is_empty());
            }
        }
    }
}

// ============================================================================
// Date kinds
// ============================================================================

proptest! {
    #[test]
    fn test_date_after_is_inverse_of_inclusive_date_before(
        date in -400i64..400,
        compare in -400i64..400,
        with_time in any::<bool>()
    ) {
        let value = if with_time {
            format!("{}T13:45:00", day(date))
        } else {
            day(date)
        };
        let datasets = json!({"t": [{"d": value}]});
        let rule = |kind: &str, inclusive: bool| json!({
            "id": kind, "name": kind, "table": "t", "column": "d", "ruleType": kind,
            "parameters": {"compareDate": day(compare), "inclusive": inclusive}
        });

        let after = single(datasets.clone(), rule("date-after", false)).is_success();
        let before = single(datasets, rule("date-before", true)).is_success();
        prop_assert_eq!(after, !before);
        prop_assert_eq!(after, date > compare);
    }

    #[test]
    fn test_date_between_inclusive_matches_calendar_order(
        date in -100i64..100,
        start in -100i64..100,
        span in 0i64..100
    ) {
        let end = start + span;
        let result = single(
            json!({"t": [{"d": day(date)}]}),
            json!({"id": "b", "name": "b", "table": "t", "column": "d",
                   "ruleType": "date-between",
                   "parameters": {"startDate": day(start), "endDate": day(end), "inclusive": true}}),
        );
        prop_assert_eq!(result.is_success(), start <= date && date <= end);
        if !result.is_success() {
            prop_assert!(result.message.contains(&day(start)));
            prop_assert!(result.message.contains(&day(end)));
        }
    }
}

// ============================================================================
// Numeric coercion
// ============================================================================

proptest! {
    #[test]
    fn test_numeric_strings_compare_as_numbers(value in -10_000i64..10_000, limit in -10_000i64..10_000) {
        let result = single(
            json!({"t": [{"q": value.to_string()}]}),
            json!({"id": "r", "name": "r", "table": "t", "column": "q",
                   "ruleType": "greater-than-equals", "parameters": {"value": limit}}),
        );
        prop_assert_eq!(result.is_success(), value >= limit);
    }

    #[test]
    fn test_range_matches_bounds(value in -1_000.0f64..1_000.0, min in -1_000.0f64..0.0, max in 0.0f64..1_000.0) {
        let result = single(
            json!({"t": [{"x": value}]}),
            json!({"id": "r", "name": "r", "table": "t", "column": "x",
                   "ruleType": "range", "parameters": {"min": min, "max": max}}),
        );
        prop_assert_eq!(result.is_success(), min <= value && value <= max);
    }
}

// ============================================================================
// Combinator
// ============================================================================

fn op_strategy() -> impl Strategy<Value = LogicalOperator> {
    prop_oneof![Just(LogicalOperator::And), Just(LogicalOperator::Or)]
}

proptest! {
    #[test]
    fn test_chain_is_flat_left_to_right_fold(
        links in prop::collection::vec((any::<bool>(), op_strategy()), 1..7)
    ) {
        let mut row = serde_json::Map::new();
        let mut conditions = Vec::new();
        for (i, (pass, op)) in links.iter().enumerate() {
            let column = format!("c{i}");
            row.insert(column.clone(), json!(if *pass { 1 } else { -1 }));
            conditions.push(json!({
                "column": column,
                "ruleType": "greater-than",
                "parameters": {"value": 0},
                "logicalOperator": op
            }));
        }

        let result = single(
            json!({"t": [row]}),
            json!({"id": "chain", "name": "chain", "table": "t", "column": "c0",
                   "ruleType": "required", "columnConditions": conditions}),
        );

        let mut expected = links[0].0;
        for i in 1..links.len() {
            expected = match links[i - 1].1 {
                LogicalOperator::And => expected && links[i].0,
                LogicalOperator::Or => expected || links[i].0,
            };
        }
        prop_assert_eq!(result.is_success(), expected);
    }
}

// ============================================================================
// Cross-table
// ============================================================================

proptest! {
    #[test]
    fn test_composite_reference_ignores_column_order(
        a in "[a-z]{1,6}",
        b in "[a-z]{1,6}",
        swapped in any::<bool>()
    ) {
        let (p, q) = if swapped { (b.clone(), a.clone()) } else { (a.clone(), b.clone()) };
        let result = single(
            json!({"t": [{"x": a, "y": b}], "refs": [{"p": p, "q": q}]}),
            json!({"id": "c", "name": "c", "table": "t", "column": "x",
                   "ruleType": "composite-reference",
                   "parameters": {"sourceColumns": ["x", "y"], "referenceTable": "refs",
                                  "referenceColumns": ["p", "q"]}}),
        );
        prop_assert!(result.is_success(), "{}", result.message);
    }

    #[test]
    fn test_reference_integrity_membership(
        keys in prop::collection::hash_set(0i64..50, 1..10),
        candidate in 0i64..50
    ) {
        let users: Vec<serde_json::Value> = keys.iter().map(|k| json!({"id": k})).collect();
        let result = single(
            json!({"t": [{"userId": candidate}], "users": users}),
            json!({"id": "fk", "name": "fk", "table": "t", "column": "userId",
                   "ruleType": "reference-integrity",
                   "parameters": {"referenceTable": "users", "referenceColumn": "id"}}),
        );
        prop_assert_eq!(result.is_success(), keys.contains(&candidate));
        if !result.is_success() {
            prop_assert!(result.message.contains(&candidate.to_string()));
        }
    }
}

// ============================================================================
// Aggregation and expressions
// ============================================================================

proptest! {
    #[test]
    fn test_result_handling_reductions(results in prop::collection::vec(any::<bool>(), 0..20)) {
        let passed = results.iter().filter(|r| **r).count();
        prop_assert_eq!(ResultHandling::All.reduce(&results), passed == results.len());
        prop_assert_eq!(ResultHandling::Any.reduce(&results), passed > 0);
        prop_assert_eq!(ResultHandling::Majority.reduce(&results), passed * 2 > results.len());
    }

    #[test]
    fn test_arithmetic_matches_f64(a in -1_000i64..1_000, b in -1_000i64..1_000, c in 1i64..100) {
        let row = Row::new().with("a", a).with("b", b).with("c", c);
        let result = evaluate("(a + b) * c - a / c", &row, None).unwrap();
        let expected = (a as f64 + b as f64) * c as f64 - a as f64 / c as f64;
        match result {
            Evaluated::Scalar(Value::Number(n)) => prop_assert!((n - expected).abs() < 1e-9),
            other => prop_assert!(false, "unexpected result {:?}", other),
        }
    }
}
