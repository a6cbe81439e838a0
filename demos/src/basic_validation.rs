//! Basic validation example demonstrating rule-guard's core functionality.
//!
//! This example shows how to:
//! - Build datasets, value lists and rules in code
//! - Run them through the sequential engine
//! - Inspect the flat result list and the run metrics
//!
//! Run with:
//! ```bash
//! cargo run --example basic_validation
//! ```

use rule_guard::prelude::*;
use rule_guard_demos::{print_report, sample_datasets, sample_lists, sample_rules};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let datasets = sample_datasets()?;
    let rules = sample_rules();
    let lists = sample_lists();

    println!("Running basic validation example...\n");
    let report = ValidationEngine::new().validate_parts(&datasets, &rules, &lists);
    print_report(&report);

    println!("\nFailures by rule:");
    for rule in &rules {
        let failing = report
            .for_rule(&rule.id)
            .into_iter()
            .filter(|r| !r.is_success())
            .count();
        if failing > 0 {
            println!("  {:<20} {failing}", rule.id);
        }
    }

    println!("\nFirst result as JSON:");
    if let Some(first) = report.results.first() {
        println!("{}", serde_json::to_string_pretty(first)?);
    }

    Ok(())
}
