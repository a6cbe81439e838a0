//! Sample data shared by the rule-guard demos.

use rule_guard::prelude::*;
use serde_json::json;

/// A small customer / order dataset with a few deliberate defects.
pub fn sample_datasets() -> Result<Datasets> {
    Datasets::from_json(json!({
        "customers": [
            {"id": 1, "name": "Alice Johnson", "email": "alice@example.com", "country": "DE",
             "registeredAt": "2023-01-15"},
            {"id": 2, "name": "Bob Smith", "email": "bob@example", "country": "US",
             "registeredAt": "2023-02-20"},
            {"id": 3, "name": "Carol Davis", "email": "", "country": "XX",
             "registeredAt": "2031-03-10"},
            {"id": 4, "name": "David Wilson", "email": "david@example.com", "country": "FR",
             "registeredAt": "15/04/2023"}
        ],
        "orders": [
            {"id": 100, "customerId": 1, "amount": 150.5, "refundAmount": 0, "fee": 2.5,
             "status": "paid", "orderedAt": "2024-01-03"},
            {"id": 101, "customerId": 2, "amount": 20, "refundAmount": 25, "fee": 1,
             "status": "refunded", "orderedAt": "2024-02-11"},
            {"id": 102, "customerId": 9, "amount": 75.25, "refundAmount": 0, "fee": 1.5,
             "status": "paid", "orderedAt": "2024-02-29"},
            {"id": 103, "customerId": 4, "amount": "n/a", "refundAmount": 0, "fee": 0,
             "status": "shipped", "orderedAt": "2024-03-05"}
        ]
    }))
}

/// The value lists referenced by [`sample_rules`].
pub fn sample_lists() -> Vec<ValueList> {
    vec![ValueList::new(
        "countries",
        "Supported countries",
        ["DE", "FR", "US"].iter().map(|c| c.to_string()).collect(),
    )]
}

/// A rule set touching most rule families.
pub fn sample_rules() -> Vec<Rule> {
    vec![
        Rule::new("email-required", "Email is required", "customers", "email", RuleType::Required),
        Rule::new("email-format", "Email format", "customers", "email", RuleType::Regex)
            .with_param("pattern", r"^[^@\s]+@[^@\s]+\.[a-z]{2,}$")
            .with_param("flags", "i")
            .with_severity(Severity::Warning),
        Rule::new("country-known", "Supported country", "customers", "country", RuleType::List)
            .with_param("listId", "countries"),
        Rule::new("registered-past", "Registered in the past", "customers", "registeredAt", RuleType::DateBefore)
            .with_param("compareDate", "today")
            .with_param("inclusive", true),
        Rule::new("registered-iso", "ISO registration date", "customers", "registeredAt", RuleType::DateFormat)
            .with_param("format", "iso")
            .with_severity(Severity::Warning),
        Rule::new("order-customer", "Order customer exists", "orders", "customerId", RuleType::ReferenceIntegrity)
            .with_param("referenceTable", "customers")
            .with_param("referenceColumn", "id"),
        Rule::new("order-amount", "Amount is positive", "orders", "amount", RuleType::GreaterThan)
            .with_param("value", 0),
        Rule::new("order-net", "Net amount covers fees", "orders", "amount", RuleType::JavascriptFormula)
            .with_param("formula", "amount - refundAmount - fee > 0"),
        Rule::new("order-status", "Known status", "orders", "status", RuleType::Enum)
            .with_param("allowedValues", json!(["paid", "refunded", "void"]))
            .with_severity(Severity::Warning),
        Rule::new("order-in-q1", "Ordered in Q1", "orders", "orderedAt", RuleType::DateBetween)
            .with_param("startDate", "2024-01-01")
            .with_param("endDate", "2024-03-31"),
    ]
}

/// Prints one line per failing or warning result.
pub fn print_report(report: &ValidationReport) {
    println!(
        "{} results: {} passed, {} warnings, {} failures ({:.1}% pass rate, {} ms)",
        report.metrics.total_results,
        report.metrics.passed,
        report.metrics.warnings,
        report.metrics.failures,
        report.metrics.success_rate(),
        report.metrics.execution_time_ms
    );
    for result in report.results.iter().filter(|r| !r.is_success()) {
        let row = result
            .row_index
            .map_or_else(|| "-".to_string(), |i| i.to_string());
        println!(
            "  [{:<7}] {}.{} row {row}: {} ({})",
            result.severity.as_str(),
            result.table,
            result.column,
            result.message,
            result.rule_name
        );
    }
}
