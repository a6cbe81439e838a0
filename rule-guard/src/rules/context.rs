//! Read-only view of the row a rule is currently evaluating.

use crate::aggregation::{AggregationCache, AggregationConfig};
use crate::dataset::{Datasets, Row, Table, ValueList};
use crate::error::GuardError;
use crate::expr::TableScope;
use crate::value::Value;

/// Everything a validator may look at for one (rule, row) pair.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    /// Name of the rule being evaluated, for configuration errors
    pub rule: &'a str,
    pub table: &'a str,
    pub row_index: usize,
    pub row: &'a Row,
    /// All rows of the rule's table
    pub rows: &'a [Row],
    pub datasets: &'a Datasets,
    pub value_lists: &'a [ValueList],
    pub cache: Option<&'a AggregationCache>,
    /// Engine-wide default for date comparisons
    pub time_aware_dates: bool,
}

impl<'a> RowContext<'a> {
    pub fn new(
        rule: &'a str,
        table: &'a Table,
        row_index: usize,
        row: &'a Row,
        datasets: &'a Datasets,
    ) -> Self {
        Self {
            rule,
            table: table.name(),
            row_index,
            row,
            rows: table.rows(),
            datasets,
            value_lists: &[],
            cache: None,
            time_aware_dates: false,
        }
    }

    pub fn with_value_lists(mut self, value_lists: &'a [ValueList]) -> Self {
        self.value_lists = value_lists;
        self
    }

    pub fn with_cache(mut self, cache: Option<&'a AggregationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_time_aware_dates(mut self, time_aware: bool) -> Self {
        self.time_aware_dates = time_aware;
        self
    }

    pub fn value(&self, column: &str) -> &'a Value {
        self.row.get(column)
    }

    /// Aggregation scope over the rule's own table.
    pub fn scope(&self, aggregations: &'a [AggregationConfig]) -> TableScope<'a> {
        TableScope {
            name: self.table,
            rows: self.rows,
            aggregations,
            cache: self.cache,
        }
    }

    pub fn configuration_error(&self, message: impl Into<String>) -> GuardError {
        GuardError::configuration(self.rule, message)
    }
}
