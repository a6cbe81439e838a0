//! Runs a JSON input document through the concurrent engine with structured
//! logging enabled.
//!
//! Run with:
//! ```bash
//! RUST_LOG=info,rule_guard=debug cargo run --example concurrent_validation
//! ```

use std::sync::Arc;

use rule_guard::logging::setup::{init_logging, LoggingConfig};
use rule_guard::prelude::*;
use rule_guard_demos::{print_report, sample_datasets, sample_lists, sample_rules};
use tracing::info;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::development())?;

    // Round-trip through JSON the way a rule editor would hand input over.
    let document = serde_json::json!({
        "datasets": sample_datasets()?,
        "rules": sample_rules(),
        "valueLists": sample_lists(),
    });
    let input = Arc::new(ValidationInput::from_json_str(&document.to_string())?);

    let engine = ValidationEngine::builder()
        .max_concurrency(4)
        .log_config(LogConfig::verbose())
        .build();
    let report = engine.validate_concurrent(input).await?;

    info!(
        results = report.metrics.total_results,
        failures = report.metrics.failures,
        "Concurrent validation finished"
    );
    print_report(&report);
    println!("\n{}", report.to_json_pretty()?);

    Ok(())
}
