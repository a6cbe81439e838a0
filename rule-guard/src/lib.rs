//! # rule-guard - Rule-based data quality validation
//!
//! rule-guard checks tabular datasets against declarative rules. A rule
//! names a table, a column and a kind (`required`, `range`, `regex`,
//! `date-between`, `reference-integrity`, `formula`, ...) together with the
//! kind's parameters. The engine evaluates every enabled rule against every
//! row of its table and emits exactly one result per (rule, row):
//! a synthesized `success`, or a `warning` / `failure` with a message naming
//! the column, the offending value and the expectation.
//!
//! ## Quick Start
//!
//! ```rust
//! use rule_guard::prelude::*;
//!
//! let datasets = Datasets::new().with_table(
//!     "orders",
//!     vec![
//!         Row::new().with("id", 1).with("amount", 120).with("status", "paid"),
//!         Row::new().with("id", 2).with("amount", -5).with("status", "paid"),
//!     ],
//! );
//!
//! let rules = vec![
//!     Rule::new("amount-positive", "Amount is positive", "orders", "amount", RuleType::GreaterThan)
//!         .with_param("value", 0),
//!     Rule::new("status-known", "Known status", "orders", "status", RuleType::Enum)
//!         .with_param("allowedValues", serde_json::json!(["open", "paid", "void"]))
//!         .with_severity(Severity::Warning),
//! ];
//!
//! let report = ValidationEngine::new().validate_parts(&datasets, &rules, &[]);
//! assert_eq!(report.results.len(), 4);
//! assert_eq!(report.metrics.failures, 1);
//! assert!(report.failures()[0].message.contains("greater than 0"));
//! ```
//!
//! ## Formulas
//!
//! `formula`, `javascript-formula` and `custom` rules are written in a small
//! expression language ([`expr`]) that is parsed into a closed syntax tree
//! and interpreted; nothing is ever executed as code. Formula rules may call
//! allow-listed aggregations such as `SUM("amount", "status == 'paid'")` or
//! `DISTINCT_GROUP_AVG("score", null, ["region"])`; see [`aggregation`].
//!
//! ## Concurrency
//!
//! [`ValidationEngine::validate`](core::ValidationEngine::validate) runs on
//! the calling thread.
//! [`validate_concurrent`](core::ValidationEngine::validate_concurrent) fans
//! rules out over tokio's blocking pool and produces the same results in the
//! same order.
//!
//! ## Logging
//!
//! The engine emits `tracing` events under the `rule_guard` target. Use
//! [`logging::setup::init_logging`] to install a subscriber in binaries.

pub mod aggregation;
pub mod core;
pub mod dataset;
pub mod error;
pub mod expr;
pub mod logging;
pub mod prelude;
pub mod repository;
pub mod rules;
pub mod sources;
pub mod value;

#[cfg(test)]
pub mod test_helpers;
