//! Table-wide aggregations referenced by formula rules.
//!
//! An [`AggregationConfig`] describes one aggregation: which function, over
//! which column, after which row filter, optionally partitioned by a
//! composite group key and de-duplicated on a distinct column. Grouped
//! (`DISTINCT_GROUP_*`) functions yield one value per group; the rule then
//! decides whether *enough* groups pass using [`ResultHandling`].
//!
//! Every config has a canonical call-site rendering
//! ([`AggregationConfig::call_site`]). Formulas reference configured
//! aggregations through it, and the per-run [`AggregationCache`] uses it as
//! part of its key.

mod cache;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dataset::Row;
use crate::expr::{Dialect, EvalContext, EvalError, Expression};
use crate::value::{coerce_for_compare, CompareOp, DatePrecision, Value};

pub use cache::{AggregationCache, CacheStats};

/// Allow-listed aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    DistinctCount,
    DistinctGroupSum,
    DistinctGroupAvg,
    DistinctGroupCount,
    DistinctGroupMin,
    DistinctGroupMax,
    DistinctGroupDistinctCount,
}

impl AggregateFunction {
    pub const ALL: [AggregateFunction; 12] = [
        AggregateFunction::Sum,
        AggregateFunction::Avg,
        AggregateFunction::Count,
        AggregateFunction::Min,
        AggregateFunction::Max,
        AggregateFunction::DistinctCount,
        AggregateFunction::DistinctGroupSum,
        AggregateFunction::DistinctGroupAvg,
        AggregateFunction::DistinctGroupCount,
        AggregateFunction::DistinctGroupMin,
        AggregateFunction::DistinctGroupMax,
        AggregateFunction::DistinctGroupDistinctCount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::DistinctCount => "DISTINCT_COUNT",
            AggregateFunction::DistinctGroupSum => "DISTINCT_GROUP_SUM",
            AggregateFunction::DistinctGroupAvg => "DISTINCT_GROUP_AVG",
            AggregateFunction::DistinctGroupCount => "DISTINCT_GROUP_COUNT",
            AggregateFunction::DistinctGroupMin => "DISTINCT_GROUP_MIN",
            AggregateFunction::DistinctGroupMax => "DISTINCT_GROUP_MAX",
            AggregateFunction::DistinctGroupDistinctCount => "DISTINCT_GROUP_DISTINCT_COUNT",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// True for the `DISTINCT_GROUP_*` family.
    pub fn is_grouped(&self) -> bool {
        matches!(
            self,
            AggregateFunction::DistinctGroupSum
                | AggregateFunction::DistinctGroupAvg
                | AggregateFunction::DistinctGroupCount
                | AggregateFunction::DistinctGroupMin
                | AggregateFunction::DistinctGroupMax
                | AggregateFunction::DistinctGroupDistinctCount
        )
    }

    /// The per-group reduction behind this function.
    pub fn reducer(&self) -> AggregateFunction {
        match self {
            AggregateFunction::DistinctGroupSum => AggregateFunction::Sum,
            AggregateFunction::DistinctGroupAvg => AggregateFunction::Avg,
            AggregateFunction::DistinctGroupCount => AggregateFunction::Count,
            AggregateFunction::DistinctGroupMin => AggregateFunction::Min,
            AggregateFunction::DistinctGroupMax => AggregateFunction::Max,
            AggregateFunction::DistinctGroupDistinctCount => AggregateFunction::DistinctCount,
            other => *other,
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How per-group verdicts reduce to one verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResultHandling {
    /// Every group must pass (vacuously true with no groups).
    #[default]
    #[serde(rename = "ALL", alias = "all")]
    All,
    /// At least one group must pass.
    #[serde(rename = "ANY", alias = "any")]
    Any,
    /// Strictly more than half of the groups must pass.
    #[serde(rename = "MAJORITY", alias = "majority")]
    Majority,
}

impl ResultHandling {
    pub fn reduce(&self, results: &[bool]) -> bool {
        let passed = results.iter().filter(|&&ok| ok).count();
        match self {
            ResultHandling::All => passed == results.len(),
            ResultHandling::Any => passed > 0,
            ResultHandling::Majority => passed * 2 > results.len(),
        }
    }
}

impl fmt::Display for ResultHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultHandling::All => write!(f, "ALL"),
            ResultHandling::Any => write!(f, "ANY"),
            ResultHandling::Majority => write!(f, "MAJORITY"),
        }
    }
}

/// How structured filter conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterLogic {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

/// One `{column, operator, value}` filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub column: String,
    pub operator: CompareOp,
    #[serde(default)]
    pub value: Value,
}

impl FilterCondition {
    pub fn new(column: impl Into<String>, operator: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Row filter applied before aggregating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregationFilter {
    /// A row-dialect boolean expression, e.g. `status == 'paid'`.
    Expression(String),
    /// Ordered conditions combined with AND or OR.
    Conditions {
        conditions: Vec<FilterCondition>,
        #[serde(rename = "type", default)]
        logic: FilterLogic,
    },
}

impl AggregationFilter {
    /// Renders the filter as row-dialect expression text.
    pub fn to_expression_text(&self) -> String {
        match self {
            AggregationFilter::Expression(text) => text.clone(),
            AggregationFilter::Conditions { conditions, logic } => {
                let joiner = match logic {
                    FilterLogic::And => " && ",
                    FilterLogic::Or => " || ",
                };
                conditions
                    .iter()
                    .map(|c| {
                        format!(
                            "{} {} {}",
                            render_field(&c.column),
                            c.operator.symbol(),
                            render_literal(&c.value)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(joiner)
            }
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            AggregationFilter::Expression(text) => text.trim().is_empty(),
            AggregationFilter::Conditions { conditions, .. } => conditions.is_empty(),
        }
    }
}

/// One configured aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationConfig {
    pub function: AggregateFunction,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<AggregationFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_column: Option<String>,
    #[serde(default)]
    pub result_handling: ResultHandling,
}

impl AggregationConfig {
    pub fn new(function: AggregateFunction, column: impl Into<String>) -> Self {
        Self {
            function,
            column: column.into(),
            alias: None,
            filter: None,
            group_columns: Vec::new(),
            distinct_column: None,
            result_handling: ResultHandling::All,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_filter(mut self, filter: AggregationFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_filter_expression(self, expression: impl Into<String>) -> Self {
        self.with_filter(AggregationFilter::Expression(expression.into()))
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn distinct_on(mut self, column: impl Into<String>) -> Self {
        self.distinct_column = Some(column.into());
        self
    }

    pub fn with_result_handling(mut self, handling: ResultHandling) -> Self {
        self.result_handling = handling;
        self
    }

    /// Canonical `FUNC("col"[, filter][, groups][, distinct])` rendering.
    ///
    /// Alias and result handling are not part of the call site.
    pub fn call_site(&self) -> String {
        let filter = self.filter.as_ref().filter(|f| !f.is_empty());
        let mut args = vec![render_literal(&Value::from(self.column.as_str()))];
        let has_groups = !self.group_columns.is_empty();
        let has_distinct = self.distinct_column.is_some();

        if filter.is_some() || has_groups || has_distinct {
            args.push(match filter {
                Some(f) => render_literal(&Value::String(f.to_expression_text())),
                None => "null".to_string(),
            });
        }
        if has_groups || has_distinct {
            let groups: Vec<String> = self
                .group_columns
                .iter()
                .map(|c| render_literal(&Value::from(c.as_str())))
                .collect();
            args.push(format!("[{}]", groups.join(", ")));
        }
        if let Some(distinct) = &self.distinct_column {
            args.push(render_literal(&Value::from(distinct.as_str())));
        }
        format!("{}({})", self.function.name(), args.join(", "))
    }
}

/// Value of one group of a grouped aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupResult {
    /// Join keys of the group columns, in configured order.
    pub key: Vec<String>,
    pub value: Value,
}

/// Output of [`aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateValue {
    Scalar(Value),
    Grouped(Vec<GroupResult>),
}

enum Predicate<'c> {
    Everything,
    Conditions {
        conditions: &'c [FilterCondition],
        logic: FilterLogic,
    },
    Expression(Expression),
}

impl<'c> Predicate<'c> {
    fn compile(filter: Option<&'c AggregationFilter>) -> Result<Self, EvalError> {
        Ok(match filter {
            None => Predicate::Everything,
            Some(f) if f.is_empty() => Predicate::Everything,
            Some(AggregationFilter::Conditions { conditions, logic }) => Predicate::Conditions {
                conditions,
                logic: *logic,
            },
            Some(AggregationFilter::Expression(text)) => {
                Predicate::Expression(Expression::compile(text, Dialect::Row)?)
            }
        })
    }

    fn matches(&self, row: &Row) -> Result<bool, EvalError> {
        match self {
            Predicate::Everything => Ok(true),
            Predicate::Conditions { conditions, logic } => {
                let hit = |c: &FilterCondition| c.operator.apply(row.get(&c.column), &c.value);
                Ok(match logic {
                    FilterLogic::And => conditions.iter().all(hit),
                    FilterLogic::Or => conditions.iter().any(hit),
                })
            }
            Predicate::Expression(expr) => Ok(expr.evaluate(&EvalContext::new(row))?.verdict()),
        }
    }
}

/// Computes one aggregation over `rows`.
pub fn aggregate(rows: &[Row], config: &AggregationConfig) -> Result<AggregateValue, EvalError> {
    let predicate = Predicate::compile(config.filter.as_ref())?;
    let mut survivors = Vec::new();
    for row in rows {
        if predicate.matches(row)? {
            survivors.push(row);
        }
    }

    let distinct = config.distinct_column.as_deref();
    if !config.function.is_grouped() {
        let rows = dedupe(survivors, distinct);
        return Ok(AggregateValue::Scalar(reduce(
            config.function,
            &config.column,
            &rows,
        )));
    }

    let mut groups: BTreeMap<Vec<String>, Vec<&Row>> = BTreeMap::new();
    for row in survivors {
        let key = config
            .group_columns
            .iter()
            .map(|c| row.get(c).join_key().unwrap_or_default())
            .collect();
        groups.entry(key).or_default().push(row);
    }

    let reducer = config.function.reducer();
    Ok(AggregateValue::Grouped(
        groups
            .into_iter()
            .map(|(key, members)| {
                let members = dedupe(members, distinct);
                GroupResult {
                    key,
                    value: reduce(reducer, &config.column, &members),
                }
            })
            .collect(),
    ))
}

/// Keeps the first row for each distinct-column value.
fn dedupe<'r>(rows: Vec<&'r Row>, distinct: Option<&str>) -> Vec<&'r Row> {
    let Some(column) = distinct else {
        return rows;
    };
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.get(column).join_key()))
        .collect()
}

fn reduce(function: AggregateFunction, column: &str, rows: &[&Row]) -> Value {
    let present = || {
        rows.iter()
            .map(move |row| row.get(column))
            .filter(|v| !v.is_absent())
    };
    let numbers = || present().filter_map(Value::as_number);

    match function.reducer() {
        AggregateFunction::Count if column == "*" => Value::Number(rows.len() as f64),
        AggregateFunction::Count => Value::Number(present().count() as f64),
        AggregateFunction::Sum => Value::Number(numbers().sum()),
        AggregateFunction::Avg => {
            let (total, count) = numbers().fold((0.0, 0usize), |(t, c), n| (t + n, c + 1));
            if count == 0 {
                Value::Null
            } else {
                Value::Number(total / count as f64)
            }
        }
        AggregateFunction::Min => extreme(numbers(), present(), Ordering::Less),
        AggregateFunction::Max => extreme(numbers(), present(), Ordering::Greater),
        AggregateFunction::DistinctCount => {
            let unique: HashSet<String> = present().filter_map(Value::join_key).collect();
            Value::Number(unique.len() as f64)
        }
        // reducer() never returns a grouped function
        grouped => unreachable!("{grouped} has no direct reducer"),
    }
}

/// Numeric min/max, falling back to coerced ordering when nothing is numeric.
fn extreme<'v>(
    numbers: impl Iterator<Item = f64>,
    present: impl Iterator<Item = &'v Value>,
    wanted: Ordering,
) -> Value {
    let best = numbers.fold(None, |best: Option<f64>, n| match best {
        Some(b) if n.partial_cmp(&b) != Some(wanted) => Some(b),
        _ => Some(n),
    });
    if let Some(n) = best {
        return Value::Number(n);
    }
    present
        .fold(None, |best: Option<&Value>, v| match best {
            Some(b) => {
                let ord = coerce_for_compare(v, b, DatePrecision::Exact).and_then(|c| c.ordering());
                if ord == Some(wanted) {
                    Some(v)
                } else {
                    Some(b)
                }
            }
            None => Some(v),
        })
        .cloned()
        .unwrap_or(Value::Null)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !matches!(
            name.to_ascii_lowercase().as_str(),
            "and" | "or" | "not" | "true" | "false" | "null" | "undefined" | "row" | "value"
        )
}

fn render_field(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        format!("row[{}]", render_literal(&Value::from(name)))
    }
}

fn render_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Date(_) => format!("\"{value}\""),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(render_literal).collect::<Vec<_>>().join(", ")
        ),
        other => other.to_string(),
    }
}
