//! Engine configuration.

use crate::logging::LogConfig;

/// Configuration for a [`ValidationEngine`](super::ValidationEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of rules evaluated at once by `validate_concurrent`
    pub max_concurrency: usize,
    /// Share aggregation results across rows and rules of one run
    pub memoize_aggregations: bool,
    /// Compare dates with their time of day instead of by calendar day
    pub time_aware_dates: bool,
    /// Turn a panicking validator into a failure result instead of unwinding
    pub catch_panics: bool,
    pub log: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: num_cpus::get().max(1),
            memoize_aggregations: true,
            time_aware_dates: false,
            catch_panics: true,
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// One rule at a time.
    pub fn sequential() -> Self {
        Self {
            max_concurrency: 1,
            ..Self::default()
        }
    }

    /// Verbose logging, no memoization and panics propagate.
    pub fn debugging() -> Self {
        Self {
            max_concurrency: 1,
            memoize_aggregations: false,
            time_aware_dates: false,
            catch_panics: false,
            log: LogConfig::verbose(),
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_memoize_aggregations(mut self, enabled: bool) -> Self {
        self.memoize_aggregations = enabled;
        self
    }

    pub fn with_time_aware_dates(mut self, enabled: bool) -> Self {
        self.time_aware_dates = enabled;
        self
    }

    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }
}
