//! Benchmarks for full validation runs.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rule_guard::prelude::*;
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn input(rows: usize) -> ValidationInput {
    let orders: Vec<serde_json::Value> = (0..rows)
        .map(|i| {
            json!({
                "id": i,
                "customerId": i % 97,
                "region": ["north", "south", "east", "west"][i % 4],
                "amount": (i % 500) as f64 * 1.25,
                "fee": (i % 7) as f64,
                "status": ["paid", "open", "void"][i % 3],
                "email": format!("customer{i}@example.com"),
                "createdAt": format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1)
            })
        })
        .collect();
    let customers: Vec<serde_json::Value> = (0..100).map(|i| json!({"id": i})).collect();

    let document = json!({
        "datasets": {"orders": orders, "customers": customers},
        "rules": [
            {"id": "email", "name": "Email", "table": "orders", "column": "email",
             "ruleType": "regex", "parameters": {"pattern": "^[^@]+@[^@]+\\.[a-z]+$"}},
            {"id": "amount", "name": "Amount", "table": "orders", "column": "amount",
             "ruleType": "range", "parameters": {"min": 0, "max": 1000}},
            {"id": "status", "name": "Status", "table": "orders", "column": "status",
             "ruleType": "list", "parameters": {"listId": "statuses"}},
            {"id": "customer", "name": "Customer", "table": "orders", "column": "customerId",
             "ruleType": "reference-integrity",
             "parameters": {"referenceTable": "customers", "referenceColumn": "id"}},
            {"id": "date", "name": "In 2024", "table": "orders", "column": "createdAt",
             "ruleType": "date-between",
             "parameters": {"startDate": "2024-01-01", "endDate": "2024-12-31"}},
            {"id": "net", "name": "Net positive", "table": "orders", "column": "amount",
             "ruleType": "javascript-formula", "parameters": {"formula": "amount - fee >= 0"}},
            {"id": "regional", "name": "Regional totals", "table": "orders", "column": "amount",
             "ruleType": "formula",
             "parameters": {"formula": "DISTINCT_GROUP_SUM(\"amount\", \"status == 'paid'\", [\"region\"]) > 0"}}
        ],
        "valueLists": [{"id": "statuses", "name": "Statuses", "values": ["paid", "open"]}]
    });
    ValidationInput::from_json_str(&document.to_string()).unwrap()
}

fn bench_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_validation");
    group.measurement_time(Duration::from_secs(8));

    for rows in [100usize, 1_000, 10_000] {
        let input = input(rows);
        group.throughput(Throughput::Elements(rows as u64));

        let memoized = ValidationEngine::new();
        group.bench_with_input(BenchmarkId::new("memoized", rows), &input, |b, input| {
            b.iter(|| memoized.validate(black_box(input)));
        });

        // aggregations are recomputed per row without the cache
        if rows <= 1_000 {
            let plain = ValidationEngine::builder().memoize_aggregations(false).build();
            group.bench_with_input(BenchmarkId::new("no_memoization", rows), &input, |b, input| {
                b.iter(|| plain.validate(black_box(input)));
            });
        }
    }

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("concurrent_validation");
    group.measurement_time(Duration::from_secs(8));

    let input = Arc::new(input(10_000));
    for workers in [1usize, 2, 4, 8] {
        let engine = ValidationEngine::builder().max_concurrency(workers).build();
        group.bench_with_input(BenchmarkId::new("workers", workers), &input, |b, input| {
            b.iter(|| rt.block_on(engine.validate_concurrent(black_box(input.clone()))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sequential, bench_concurrent);
criterion_main!(benches);
