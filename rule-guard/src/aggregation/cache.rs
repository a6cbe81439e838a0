//! Per-run memoization of aggregation results.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::{aggregate, AggregateValue, AggregationConfig};
use crate::dataset::Row;
use crate::expr::EvalError;

/// Caches aggregation results keyed by `(table, call site)`.
///
/// A cache lives for one validation run and is shared by every row and
/// every worker of that run, so each distinct aggregation is computed once.
#[derive(Debug, Default)]
pub struct AggregationCache {
    entries: RwLock<HashMap<(String, String), Arc<AggregateValue>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AggregationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value or computes and stores it.
    pub fn get_or_compute(
        &self,
        table: &str,
        rows: &[Row],
        config: &AggregationConfig,
    ) -> Result<Arc<AggregateValue>, EvalError> {
        let key = (table.to_string(), config.call_site());
        if let Some(found) = self.lookup(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(found);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed = Arc::new(aggregate(rows, config)?);
        match self.entries.write() {
            Ok(mut entries) => Ok(entries.entry(key).or_insert(computed).clone()),
            // A poisoned map only loses memoization.
            Err(_) => Ok(computed),
        }
    }

    fn lookup(&self, key: &(String, String)) -> Option<Arc<AggregateValue>> {
        self.entries.read().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::AggregateFunction;
    use crate::value::Value;

    #[test]
    fn test_memoizes_per_table_and_call_site() {
        let rows = vec![Row::new().with("x", 1), Row::new().with("x", 2)];
        let cache = AggregationCache::new();
        let sum = AggregationConfig::new(AggregateFunction::Sum, "x");
        let max = AggregationConfig::new(AggregateFunction::Max, "x");

        let first = cache.get_or_compute("t", &rows, &sum).unwrap();
        let again = cache.get_or_compute("t", &rows, &sum).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(*first, AggregateValue::Scalar(Value::Number(3.0)));

        cache.get_or_compute("t", &rows, &max).unwrap();
        cache.get_or_compute("other", &rows, &sum).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 3);
        assert!((stats.hit_rate() - 0.25).abs() < f64::EPSILON);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_errors_are_not_cached() {
        let rows = vec![Row::new().with("x", 1)];
        let cache = AggregationCache::new();
        let bad = AggregationConfig::new(AggregateFunction::Sum, "x").with_filter_expression("x >");
        assert!(cache.get_or_compute("t", &rows, &bad).is_err());
        assert!(cache.is_empty());
    }
}
