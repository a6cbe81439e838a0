//! The validation orchestrator.
//!
//! A run plans every enabled rule once, evaluates the plan against every row
//! of the rule's table and emits exactly one [`ValidationResult`] per
//! (rule, row). Nothing a rule does can abort the run: configuration errors,
//! evaluation errors and panics all become results.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::result::{ResultBuffer, ValidationMetrics, ValidationReport, ValidationResult};
use super::{EngineConfig, Outcome, ResultSeverity};
use crate::aggregation::AggregationCache;
use crate::dataset::{Datasets, ValidationInput, ValueList};
use crate::error::{GuardError, Result};
use crate::logging::truncate_field;
use crate::rules::reference::CrossTableCheck;
use crate::rules::{ConditionChain, RowContext, Rule, RuleKind, RuleType};
use crate::{log_row_failure, log_rule};

const PASSED: &str = "Passed";

/// Which evaluation path a rule takes, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPath {
    /// `date-*` kinds; requires a column
    DateSafeguarded,
    ColumnComparison,
    MathOperation,
    CompositeReference,
    ReferenceIntegrity,
    /// `columnConditions` joined with AND / OR
    Combinator,
    /// `crossTableConditions` without column conditions
    CrossTable,
    /// The validator named by `ruleType`
    Primitive,
}

impl DispatchPath {
    pub fn for_rule(rule: &Rule) -> Self {
        if rule.rule_type.is_date() {
            return DispatchPath::DateSafeguarded;
        }
        match rule.rule_type {
            RuleType::ColumnComparison => DispatchPath::ColumnComparison,
            RuleType::MathOperation => DispatchPath::MathOperation,
            RuleType::CompositeReference => DispatchPath::CompositeReference,
            RuleType::ReferenceIntegrity => DispatchPath::ReferenceIntegrity,
            _ if rule.has_column_conditions() => DispatchPath::Combinator,
            _ if rule.has_cross_table_conditions() => DispatchPath::CrossTable,
            _ => DispatchPath::Primitive,
        }
    }
}

/// A rule prepared for row-by-row evaluation.
#[derive(Debug)]
enum Plan {
    Single(RuleKind),
    Chain(ConditionChain),
    /// Planning failed; every row reports this message.
    Broken(String),
}

impl Plan {
    fn build(rule: &Rule, path: DispatchPath) -> Self {
        let planned = match path {
            DispatchPath::DateSafeguarded if rule.column.trim().is_empty() => {
                Err(GuardError::configuration(
                    &rule.name,
                    format!("{} requires a column", rule.rule_type),
                ))
            }
            DispatchPath::Combinator => ConditionChain::from_rule(rule).map(Plan::Chain),
            DispatchPath::CrossTable => Ok(Plan::Single(RuleKind::CrossTable(CrossTableCheck::new(
                rule.cross_table_conditions.clone(),
            )))),
            _ => RuleKind::from_rule(rule).map(Plan::Single),
        };
        planned.unwrap_or_else(|e| {
            Plan::Broken(match e {
                GuardError::Configuration { message, .. } => message,
                other => other.to_string(),
            })
        })
    }

    fn evaluate(&self, rule: &Rule, ctx: &RowContext<'_>) -> Result<Outcome> {
        match self {
            Plan::Single(kind) => kind.validate(&rule.column, ctx),
            Plan::Chain(chain) => chain.evaluate(ctx),
            Plan::Broken(message) => Err(GuardError::configuration(&rule.name, message.clone())),
        }
    }
}

/// Runs `f`, converting a panic into its message when `catch` is set.
fn guarded<T, F>(catch: bool, f: F) -> std::result::Result<T, String>
where
    F: FnOnce() -> T,
{
    if !catch {
        return Ok(f());
    }
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string())
    })
}

/// Validates datasets against rules.
///
/// # Examples
///
/// ```rust
/// use rule_guard::prelude::*;
/// use serde_json::json;
///
/// let input: ValidationInput = serde_json::from_value(json!({
///     "datasets": {"users": [{"email": "ada@example.com"}, {"email": ""}]},
///     "rules": [{
///         "id": "r1", "name": "Email required", "table": "users",
///         "column": "email", "ruleType": "required", "severity": "failure"
///     }]
/// })).unwrap();
///
/// let report = ValidationEngine::new().validate(&input);
/// assert_eq!(report.metrics.passed, 1);
/// assert_eq!(report.failures()[0].row_index, Some(1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    config: EngineConfig,
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn builder() -> ValidationEngineBuilder {
        ValidationEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parses a `{datasets, rules, valueLists}` document and validates it.
    pub fn validate_json(&self, input: &str) -> Result<ValidationReport> {
        Ok(self.validate(&ValidationInput::from_json_str(input)?))
    }

    /// Validates sequentially on the calling thread.
    #[instrument(skip(self, input), fields(
        rules = input.rules.len(),
        tables = input.datasets.len()
    ))]
    pub fn validate(&self, input: &ValidationInput) -> ValidationReport {
        self.validate_parts(&input.datasets, &input.rules, &input.value_lists)
    }

    /// Like [`validate`](Self::validate) without building a [`ValidationInput`].
    pub fn validate_parts(
        &self,
        datasets: &Datasets,
        rules: &[Rule],
        value_lists: &[ValueList],
    ) -> ValidationReport {
        info!(rules = rules.len(), tables = datasets.len(), "Starting validation run");
        let start = Instant::now();
        let cache = self.config.memoize_aggregations.then(AggregationCache::new);

        let mut buffer = ResultBuffer::new();
        for rule in rules.iter().filter(|r| r.enabled) {
            self.run_rule(rule, datasets, value_lists, cache.as_ref(), &mut buffer);
        }
        self.finish(rules, buffer, start, cache.as_ref())
    }

    /// Validates with rules fanned out over tokio's blocking pool.
    ///
    /// At most `max_concurrency` rules run at once. Each worker fills its own
    /// buffer; buffers are merged in rule order, so the result order matches
    /// [`validate`](Self::validate).
    #[instrument(skip(self, input), fields(
        rules = input.rules.len(),
        tables = input.datasets.len(),
        max_concurrency = self.config.max_concurrency
    ))]
    pub async fn validate_concurrent(&self, input: Arc<ValidationInput>) -> Result<ValidationReport> {
        info!(
            rules = input.rules.len(),
            max_concurrency = self.config.max_concurrency,
            "Starting concurrent validation run"
        );
        let start = Instant::now();
        let cache = self
            .config
            .memoize_aggregations
            .then(|| Arc::new(AggregationCache::new()));
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        let mut workers = JoinSet::new();
        for (position, rule) in input.rules.iter().enumerate() {
            if !rule.enabled {
                continue;
            }
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| GuardError::Internal(format!("validation semaphore closed: {e}")))?;
            let engine = self.clone();
            let input = Arc::clone(&input);
            let cache = cache.clone();
            workers.spawn_blocking(move || {
                let _permit = permit;
                let mut buffer = ResultBuffer::new();
                if let Some(rule) = input.rules.get(position) {
                    engine.run_rule(
                        rule,
                        &input.datasets,
                        &input.value_lists,
                        cache.as_deref(),
                        &mut buffer,
                    );
                }
                (position, buffer)
            });
        }

        let mut buffers = Vec::with_capacity(workers.len());
        while let Some(joined) = workers.join_next().await {
            let finished = joined
                .map_err(|e| GuardError::Internal(format!("validation worker failed: {e}")))?;
            buffers.push(finished);
        }
        buffers.sort_by_key(|(position, _)| *position);

        let mut merged = ResultBuffer::new();
        for (_, buffer) in buffers {
            merged.merge(buffer);
        }
        Ok(self.finish(&input.rules, merged, start, cache.as_deref()))
    }

    fn finish(
        &self,
        rules: &[Rule],
        buffer: ResultBuffer,
        start: Instant,
        cache: Option<&AggregationCache>,
    ) -> ValidationReport {
        let results = buffer.into_results();
        let mut metrics = ValidationMetrics::new();
        metrics.total_rules = rules.len();
        metrics.rules_evaluated = rules.iter().filter(|r| r.enabled).count();
        metrics.rules_skipped = metrics.total_rules - metrics.rules_evaluated;
        metrics.record(&results);
        metrics.execution_time_ms = start.elapsed().as_millis() as u64;

        if let Some(stats) = cache.map(AggregationCache::stats) {
            debug!(
                cache.entries = stats.entries,
                cache.hits = stats.hits,
                cache.misses = stats.misses,
                "Aggregation cache statistics"
            );
        }
        info!(
            metrics.rules_evaluated = metrics.rules_evaluated,
            metrics.rules_skipped = metrics.rules_skipped,
            metrics.passed = metrics.passed,
            metrics.warnings = metrics.warnings,
            metrics.failures = metrics.failures,
            metrics.execution_time_ms = metrics.execution_time_ms,
            "Validation run completed"
        );
        ValidationReport::new(results, metrics)
    }

    /// Evaluates one enabled rule over its table into `buffer`.
    fn run_rule(
        &self,
        rule: &Rule,
        datasets: &Datasets,
        value_lists: &[ValueList],
        cache: Option<&AggregationCache>,
        buffer: &mut ResultBuffer,
    ) {
        let Some(table) = datasets.table(&rule.table) else {
            warn!(rule.id = %rule.id, table = %rule.table, "Rule references an unknown table");
            buffer.push(ValidationResult {
                row_index: None,
                table: rule.table.clone(),
                column: rule.column.clone(),
                rule_name: rule.name.clone(),
                message: format!("Configuration error: table '{}' not found", rule.table),
                severity: ResultSeverity::Failure,
                rule_id: rule.id.clone(),
            });
            return;
        };

        let path = DispatchPath::for_rule(rule);
        let plan = Plan::build(rule, path);
        log_rule!(
            self.config.log,
            rule.id = %rule.id,
            rule.kind = %rule.rule_type,
            path = ?path,
            rows = table.len(),
            "Planned rule"
        );
        if let Plan::Broken(message) = &plan {
            warn!(rule.id = %rule.id, rule.name = %rule.name, %message, "Rule is misconfigured");
        }

        let keyed = matches!(rule.rule_type, RuleType::List | RuleType::JavascriptFormula);
        for (index, row) in table.rows().iter().enumerate() {
            let ctx = RowContext::new(&rule.name, table, index, row, datasets)
                .with_value_lists(value_lists)
                .with_cache(cache)
                .with_time_aware_dates(self.config.time_aware_dates);
            let evaluated = guarded(self.config.catch_panics, || plan.evaluate(rule, &ctx));
            let result = self.to_result(rule, index, evaluated);
            if keyed {
                buffer.upsert(result);
            } else {
                buffer.push(result);
            }
        }
    }

    fn to_result(
        &self,
        rule: &Rule,
        row_index: usize,
        evaluated: std::result::Result<Result<Outcome>, String>,
    ) -> ValidationResult {
        let (severity, message, column): (ResultSeverity, String, Option<String>) = match evaluated {
            Ok(Ok(outcome)) if outcome.is_valid => (ResultSeverity::Success, PASSED.to_string(), None),
            Ok(Ok(outcome)) => {
                let message = outcome
                    .message
                    .unwrap_or_else(|| format!("{} failed", rule.name));
                (rule.severity.into(), message, outcome.column)
            }
            Ok(Err(err)) if err.is_configuration() => {
                (ResultSeverity::Failure, err.result_message(), None)
            }
            Ok(Err(err)) => (rule.severity.into(), err.result_message(), None),
            Err(panic_message) => {
                error!(
                    rule.id = %rule.id,
                    row = row_index,
                    panic = %panic_message,
                    "Validator panicked"
                );
                (
                    ResultSeverity::Failure,
                    format!("Validator panicked in rule {}: {panic_message}", rule.id),
                    None,
                )
            }
        };

        if !severity.is_success() {
            log_row_failure!(
                self.config.log,
                rule.id = %rule.id,
                row = row_index,
                message = %truncate_field(&message, self.config.log.max_field_length),
                "Row failed"
            );
        }

        ValidationResult {
            row_index: Some(row_index),
            table: rule.table.clone(),
            column: column.unwrap_or_else(|| rule.column.clone()),
            rule_name: rule.name.clone(),
            message,
            severity,
            rule_id: rule.id.clone(),
        }
    }
}

/// Builder for [`ValidationEngine`].
#[derive(Debug, Clone, Default)]
pub struct ValidationEngineBuilder {
    config: EngineConfig,
}

impl ValidationEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.config = self.config.with_max_concurrency(max_concurrency);
        self
    }

    pub fn memoize_aggregations(mut self, enabled: bool) -> Self {
        self.config.memoize_aggregations = enabled;
        self
    }

    pub fn time_aware_dates(mut self, enabled: bool) -> Self {
        self.config.time_aware_dates = enabled;
        self
    }

    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.config.catch_panics = enabled;
        self
    }

    pub fn log_config(mut self, log: crate::logging::LogConfig) -> Self {
        self.config.log = log;
        self
    }

    pub fn build(self) -> ValidationEngine {
        ValidationEngine::with_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;
    use crate::rules::ColumnCondition;
    use serde_json::json;

    fn datasets() -> Datasets {
        Datasets::from_json(json!({
            "users": [
                {"id": 1, "email": "ada@example.com", "age": 36},
                {"id": 2, "email": "", "age": 17},
                {"id": 3, "email": "grace@example.com"}
            ]
        }))
        .unwrap()
    }

    fn run(rules: Vec<Rule>) -> ValidationReport {
        ValidationEngine::new().validate_parts(&datasets(), &rules, &[])
    }

    #[test]
    fn test_dispatch_precedence() {
        let date = Rule::new("r", "n", "t", "d", RuleType::DateBefore)
            .with_condition(ColumnCondition::new("x", RuleType::Required, json!({})));
        assert_eq!(DispatchPath::for_rule(&date), DispatchPath::DateSafeguarded);

        let reference = Rule::new("r", "n", "t", "d", RuleType::ReferenceIntegrity)
            .with_condition(ColumnCondition::new("x", RuleType::Required, json!({})));
        assert_eq!(DispatchPath::for_rule(&reference), DispatchPath::ReferenceIntegrity);

        let chain = Rule::new("r", "n", "t", "d", RuleType::Required)
            .with_condition(ColumnCondition::new("x", RuleType::Required, json!({})))
            .with_cross_table_condition(crate::rules::CrossTableCondition::new(
                "u",
                "id",
                crate::value::CompareOp::Gt,
                0,
            ));
        assert_eq!(DispatchPath::for_rule(&chain), DispatchPath::Combinator);

        let plain = Rule::new("r", "n", "t", "d", RuleType::Regex);
        assert_eq!(DispatchPath::for_rule(&plain), DispatchPath::Primitive);
    }

    #[test]
    fn test_one_result_per_row() {
        let report = run(vec![
            Rule::new("email", "Email required", "users", "email", RuleType::Required),
            Rule::new("adult", "Adult", "users", "age", RuleType::GreaterThanEquals)
                .with_param("value", 18)
                .with_severity(Severity::Warning),
        ]);
        assert_eq!(report.results.len(), 6);
        assert_eq!(report.metrics.passed, 4);
        assert_eq!(report.metrics.failures, 1);
        assert_eq!(report.metrics.warnings, 1);

        let adult = report.for_rule("adult");
        assert_eq!(adult[1].severity, ResultSeverity::Warning);
        // absent age passes
        assert_eq!(adult[2].severity, ResultSeverity::Success);
        assert_eq!(adult[2].message, "Passed");
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let report = run(vec![
            Rule::new("off", "Off", "users", "email", RuleType::Required).disabled()
        ]);
        assert!(report.results.is_empty());
        assert_eq!(report.metrics.rules_skipped, 1);
        assert_eq!(report.metrics.rules_evaluated, 0);
    }

    #[test]
    fn test_unknown_table_is_rule_level_failure() {
        let report = run(vec![Rule::new("r", "Ghost", "ghosts", "id", RuleType::Required)
            .with_severity(Severity::Warning)]);
        assert_eq!(report.results.len(), 1);
        let result = &report.results[0];
        assert_eq!(result.row_index, None);
        assert_eq!(result.severity, ResultSeverity::Failure);
        assert!(result.message.starts_with("Configuration error"));
    }

    #[test]
    fn test_configuration_errors_are_failures_per_row() {
        let report = run(vec![Rule::new("r", "Bad regex", "users", "email", RuleType::Regex)
            .with_param("pattern", "(")
            .with_severity(Severity::Warning)]);
        assert_eq!(report.results.len(), 3);
        assert!(report
            .results
            .iter()
            .all(|r| r.severity == ResultSeverity::Failure && r.message.starts_with("Configuration error")));
    }

    #[test]
    fn test_evaluation_errors_take_rule_severity() {
        let rule = Rule::new("r", "Ratio", "users", "", RuleType::Formula)
            .with_param("formula", "id / (id - 2) > 0")
            .with_severity(Severity::Warning);
        let report = run(vec![rule]);
        assert_eq!(report.results[1].severity, ResultSeverity::Warning);
        assert_eq!(report.results[1].message, "Division by zero");
    }

    #[test]
    fn test_date_rule_without_column() {
        let rule = Rule::new("r", "Date", "users", "", RuleType::DateBefore)
            .with_param("compareDate", "2024-01-01");
        let report = run(vec![rule]);
        assert!(report.results.iter().all(|r| r.message.contains("requires a column")));
    }

    #[test]
    fn test_guarded_catches_panics() {
        let caught = guarded(true, || -> u32 { panic!("boom") });
        assert_eq!(caught, Err("boom".to_string()));
        assert_eq!(guarded(true, || 7), Ok(7));
        assert_eq!(guarded(false, || 7), Ok(7));
    }

    #[test]
    fn test_panic_becomes_failure_result() {
        let engine = ValidationEngine::new();
        let rule = Rule::new("boom", "Boom", "users", "email", RuleType::Required)
            .with_severity(Severity::Warning);
        let result = engine.to_result(&rule, 4, Err("index out of bounds".into()));
        assert_eq!(result.severity, ResultSeverity::Failure);
        assert_eq!(result.row_index, Some(4));
        assert!(result.message.contains("boom"));
    }

    #[test]
    fn test_validate_json() {
        let report = ValidationEngine::new()
            .validate_json(
                r#"{"datasets": {"t": [{"x": 1}]},
                    "rules": [{"id": "r", "name": "n", "table": "t", "column": "x",
                               "ruleType": "required"}]}"#,
            )
            .unwrap();
        assert_eq!(report.metrics.passed, 1);
        assert!(ValidationEngine::new().validate_json("{").is_err());
    }
}
