//! Validation result types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ResultSeverity;
use crate::error::Result;

/// One verdict for one (rule, row) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// `None` only for rule-level configuration failures
    pub row_index: Option<usize>,
    pub table: String,
    pub column: String,
    pub rule_name: String,
    pub message: String,
    pub severity: ResultSeverity,
    pub rule_id: String,
}

impl ValidationResult {
    pub fn key(&self) -> ResultKey {
        ResultKey {
            rule_id: self.rule_id.clone(),
            table: self.table.clone(),
            row_index: self.row_index,
        }
    }

    pub fn is_success(&self) -> bool {
        self.severity.is_success()
    }
}

/// Identity of a result under replace-by-key semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultKey {
    pub rule_id: String,
    pub table: String,
    pub row_index: Option<usize>,
}

/// Ordered result accumulator.
///
/// Most results are appended. Results written with [`ResultBuffer::upsert`]
/// replace any earlier keyed result with the same [`ResultKey`] in place, so
/// the last write wins while the original position is kept.
#[derive(Debug, Clone, Default)]
pub struct ResultBuffer {
    entries: Vec<(ValidationResult, bool)>,
    keyed: HashMap<ResultKey, usize>,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: ValidationResult) {
        self.entries.push((result, false));
    }

    pub fn upsert(&mut self, result: ValidationResult) {
        let key = result.key();
        match self.keyed.get(&key) {
            Some(&index) => self.entries[index] = (result, true),
            None => {
                self.keyed.insert(key, self.entries.len());
                self.entries.push((result, true));
            }
        }
    }

    /// Appends `other`, resolving keyed duplicates.
    pub fn merge(&mut self, other: ResultBuffer) {
        for (result, keyed) in other.entries {
            if keyed {
                self.upsert(result);
            } else {
                self.push(result);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationResult> {
        self.entries.iter().map(|(result, _)| result)
    }

    pub fn into_results(self) -> Vec<ValidationResult> {
        self.entries.into_iter().map(|(result, _)| result).collect()
    }
}

/// Metrics collected during a validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMetrics {
    /// Rules handed to the engine
    pub total_rules: usize,
    /// Enabled rules that were evaluated
    pub rules_evaluated: usize,
    /// Disabled rules
    pub rules_skipped: usize,
    pub total_results: usize,
    pub passed: usize,
    pub warnings: usize,
    pub failures: usize,
    /// Wall-clock time of the run in milliseconds
    pub execution_time_ms: u64,
}

impl ValidationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tallies the severities of `results`.
    pub fn record<'a>(&mut self, results: impl IntoIterator<Item = &'a ValidationResult>) {
        for result in results {
            self.total_results += 1;
            match result.severity {
                ResultSeverity::Success => self.passed += 1,
                ResultSeverity::Warning => self.warnings += 1,
                ResultSeverity::Failure => self.failures += 1,
            }
        }
    }

    /// Returns the pass rate as a percentage (0.0 to 100.0).
    pub fn success_rate(&self) -> f64 {
        if self.total_results == 0 {
            100.0
        } else {
            (self.passed as f64 / self.total_results as f64) * 100.0
        }
    }
}

/// Everything a validation run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Timestamp when the run finished (ISO 8601 format)
    pub timestamp: String,
    pub metrics: ValidationMetrics,
    pub results: Vec<ValidationResult>,
}

impl ValidationReport {
    pub fn new(results: Vec<ValidationResult>, metrics: ValidationMetrics) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            metrics,
            results,
        }
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ValidationResult> {
        self.results
    }

    pub fn has_failures(&self) -> bool {
        self.metrics.failures > 0
    }

    pub fn failures(&self) -> Vec<&ValidationResult> {
        self.by_severity(ResultSeverity::Failure)
    }

    pub fn warnings(&self) -> Vec<&ValidationResult> {
        self.by_severity(ResultSeverity::Warning)
    }

    pub fn by_severity(&self, severity: ResultSeverity) -> Vec<&ValidationResult> {
        self.results
            .iter()
            .filter(|r| r.severity == severity)
            .collect()
    }

    pub fn for_rule(&self, rule_id: &str) -> Vec<&ValidationResult> {
        self.results.iter().filter(|r| r.rule_id == rule_id).collect()
    }

    /// Serializes the flat result list.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.results)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.results)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(rule_id: &str, row: Option<usize>, severity: ResultSeverity, message: &str) -> ValidationResult {
        ValidationResult {
            row_index: row,
            table: "orders".into(),
            column: "amount".into(),
            rule_name: format!("rule {rule_id}"),
            message: message.into(),
            severity,
            rule_id: rule_id.into(),
        }
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut buffer = ResultBuffer::new();
        buffer.upsert(result("a", Some(0), ResultSeverity::Failure, "first"));
        buffer.push(result("b", Some(0), ResultSeverity::Success, "Passed"));
        buffer.upsert(result("a", Some(0), ResultSeverity::Success, "second"));
        buffer.upsert(result("a", Some(1), ResultSeverity::Success, "other row"));

        let results = buffer.into_results();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].message, "second");
        assert_eq!(results[1].rule_id, "b");
        assert_eq!(results[2].row_index, Some(1));
    }

    #[test]
    fn test_push_never_deduplicates() {
        let mut buffer = ResultBuffer::new();
        buffer.push(result("a", Some(0), ResultSeverity::Success, "Passed"));
        buffer.push(result("a", Some(0), ResultSeverity::Success, "Passed"));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_merge_resolves_keyed_duplicates() {
        let mut left = ResultBuffer::new();
        left.upsert(result("a", Some(0), ResultSeverity::Failure, "stale"));
        left.push(result("b", Some(0), ResultSeverity::Success, "Passed"));

        let mut right = ResultBuffer::new();
        right.upsert(result("a", Some(0), ResultSeverity::Success, "fresh"));
        right.push(result("b", Some(0), ResultSeverity::Success, "Passed"));

        left.merge(right);
        let results = left.into_results();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].message, "fresh");
    }

    #[test]
    fn test_metrics() {
        let results = vec![
            result("a", Some(0), ResultSeverity::Success, "Passed"),
            result("a", Some(1), ResultSeverity::Failure, "bad"),
            result("b", Some(0), ResultSeverity::Warning, "meh"),
            result("b", Some(1), ResultSeverity::Success, "Passed"),
        ];
        let mut metrics = ValidationMetrics::new();
        metrics.record(&results);
        assert_eq!((metrics.passed, metrics.warnings, metrics.failures), (2, 1, 1));
        assert!((metrics.success_rate() - 50.0).abs() < f64::EPSILON);
        assert!((ValidationMetrics::new().success_rate() - 100.0).abs() < f64::EPSILON);

        let report = ValidationReport::new(results, metrics);
        assert!(report.has_failures());
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.warnings().len(), 1);
        assert_eq!(report.for_rule("b").len(), 2);
    }

    #[test]
    fn test_json_shape() {
        let report = ValidationReport::new(
            vec![result("cfg", None, ResultSeverity::Failure, "Configuration error: x")],
            ValidationMetrics::new(),
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        let first = &json[0];
        assert_eq!(first["rowIndex"], serde_json::Value::Null);
        assert_eq!(first["ruleName"], "rule cfg");
        assert_eq!(first["severity"], "failure");
        assert_eq!(first["ruleId"], "cfg");
    }
}
