//! Validates data that arrives as Arrow record batches.
//!
//! Run with:
//! ```bash
//! cargo run --example arrow_source
//! ```

use std::sync::Arc;

use arrow::array::{BooleanArray, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rule_guard::prelude::*;
use rule_guard::sources::insert_batches;
use rule_guard_demos::print_report;

fn shipments() -> std::result::Result<RecordBatch, arrow::error::ArrowError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("carrier", DataType::Utf8, true),
        Field::new("weightKg", DataType::Float64, true),
        Field::new("fragile", DataType::Boolean, false),
        Field::new("shippedOn", DataType::Date32, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Arc::new(StringArray::from(vec![Some("DHL"), None, Some("ups")])),
            Arc::new(Float64Array::from(vec![Some(2.5), Some(-1.0), None])),
            Arc::new(BooleanArray::from(vec![false, true, false])),
            // days since 1970-01-01
            Arc::new(Date32Array::from(vec![Some(19_723), Some(19_800), None])),
        ],
    )
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut datasets = Datasets::new();
    insert_batches(&mut datasets, "shipments", &[shipments()?])?;

    let rules = vec![
        Rule::new("carrier", "Carrier required", "shipments", "carrier", RuleType::Required),
        Rule::new("carrier-case", "Known carrier", "shipments", "carrier", RuleType::Enum)
            .with_param("allowedValues", "DHL, UPS, FedEx")
            .with_param("caseInsensitive", true),
        Rule::new("weight", "Positive weight", "shipments", "weightKg", RuleType::Range)
            .with_param("min", 0)
            .with_param("inclusive", false),
        Rule::new("shipped", "Shipped in 2024", "shipments", "shippedOn", RuleType::DateAfter)
            .with_param("compareDate", "2023-12-31"),
    ];

    let report = ValidationEngine::new().validate_parts(&datasets, &rules, &[]);
    print_report(&report);
    Ok(())
}
