//! Rules that look at other tables: `reference-integrity`,
//! `composite-reference` and generic cross-table conditions.
//!
//! Each check is planned once per rule per run. Lookups into the other table
//! are built lazily on the first row and reused for every following row.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::OnceCell;
use serde::Deserialize;

use super::context::RowContext;
use super::kind::KindSource;
use super::params::{decode, require_text, string_list};
use super::CrossTableCondition;
use crate::core::Outcome;
use crate::dataset::Table;
use crate::error::Result;
use crate::value::Value;

fn reference_table<'a>(ctx: &RowContext<'a>, name: &str) -> Result<&'a Table> {
    ctx.datasets
        .table(name)
        .ok_or_else(|| ctx.configuration_error(format!("reference table '{name}' not found")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckType {
    #[default]
    Exists,
    NotExists,
}

/// A column value must (or must not) appear in another table's column.
#[derive(Debug, Clone)]
pub struct ReferenceIntegrityCheck {
    pub reference_table: String,
    pub reference_column: String,
    pub check_type: CheckType,
    keys: OnceCell<HashSet<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferenceParams {
    reference_table: String,
    reference_column: String,
    #[serde(default)]
    check_type: CheckType,
}

impl ReferenceIntegrityCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let params: ReferenceParams = decode(source)?;
        require_text(source, "referenceTable", &params.reference_table)?;
        require_text(source, "referenceColumn", &params.reference_column)?;
        Ok(Self {
            reference_table: params.reference_table,
            reference_column: params.reference_column,
            check_type: params.check_type,
            keys: OnceCell::new(),
        })
    }

    fn keys(&self, ctx: &RowContext<'_>) -> Result<&HashSet<String>> {
        self.keys.get_or_try_init(|| {
            let table = reference_table(ctx, &self.reference_table)?;
            Ok(table
                .column_values(&self.reference_column)
                .filter_map(Value::join_key)
                .collect())
        })
    }

    pub fn validate(&self, column: &str, value: &Value, ctx: &RowContext<'_>) -> Result<Outcome> {
        let Some(key) = value.join_key() else {
            return Ok(Outcome::pass());
        };
        let found = self.keys(ctx)?.contains(&key);
        let (ok, verb) = match self.check_type {
            CheckType::Exists => (found, "does not exist"),
            CheckType::NotExists => (!found, "must not exist"),
        };
        Ok(Outcome::check(ok, || {
            format!(
                "Value {value} in {}.{column} {verb} in {}.{}",
                ctx.table, self.reference_table, self.reference_column
            )
        }))
    }
}

/// A set of source columns must match, order-independently, the values of
/// some row across a set of reference columns.
#[derive(Debug, Clone)]
pub struct CompositeReferenceCheck {
    pub source_columns: Vec<String>,
    pub reference_table: String,
    pub reference_columns: Vec<String>,
    combinations: OnceCell<HashSet<BTreeSet<String>>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompositeParams {
    #[serde(default, deserialize_with = "string_list")]
    source_columns: Vec<String>,
    reference_table: String,
    #[serde(deserialize_with = "string_list")]
    reference_columns: Vec<String>,
}

impl CompositeReferenceCheck {
    pub(crate) fn decode(source: &KindSource<'_>) -> Result<Self> {
        let params: CompositeParams = decode(source)?;
        require_text(source, "referenceTable", &params.reference_table)?;
        let source_columns = if params.source_columns.is_empty() {
            std::iter::once(source.column)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .chain(source.secondary_columns.iter().cloned())
                .collect()
        } else {
            params.source_columns
        };
        if source_columns.is_empty() || source_columns.len() != params.reference_columns.len() {
            return Err(source.configuration_error(format!(
                "composite-reference needs matching column lists, got {} source and {} reference columns",
                source_columns.len(),
                params.reference_columns.len()
            )));
        }
        Ok(Self {
            source_columns,
            reference_table: params.reference_table,
            reference_columns: params.reference_columns,
            combinations: OnceCell::new(),
        })
    }

    /// Distinct value sets of every complete reference row.
    fn combinations(&self, ctx: &RowContext<'_>) -> Result<&HashSet<BTreeSet<String>>> {
        self.combinations.get_or_try_init(|| {
            let table = reference_table(ctx, &self.reference_table)?;
            Ok(table
                .rows()
                .iter()
                .filter_map(|row| {
                    self.reference_columns
                        .iter()
                        .map(|c| row.get(c).join_key())
                        .collect::<Option<BTreeSet<_>>>()
                })
                .collect())
        })
    }

    pub fn validate(&self, ctx: &RowContext<'_>) -> Result<Outcome> {
        let Some(wanted) = self
            .source_columns
            .iter()
            .map(|c| ctx.value(c).join_key())
            .collect::<Option<BTreeSet<_>>>()
        else {
            return Ok(Outcome::pass());
        };
        let found = self.combinations(ctx)?.contains(&wanted);
        Ok(Outcome::check(found, || {
            let values: Vec<String> = self
                .source_columns
                .iter()
                .map(|c| ctx.value(c).to_string())
                .collect();
            format!(
                "Combination ({}) in {}.({}) does not exist in {}.({})",
                values.join(", "),
                ctx.table,
                self.source_columns.join(", "),
                self.reference_table,
                self.reference_columns.join(", ")
            )
        }))
    }
}

/// Row-independent existence conditions over other tables, AND-combined.
#[derive(Debug, Clone)]
pub struct CrossTableCheck {
    pub conditions: Vec<CrossTableCondition>,
    verdict: OnceCell<Outcome>,
}

impl CrossTableCheck {
    pub fn new(conditions: Vec<CrossTableCondition>) -> Self {
        Self {
            conditions,
            verdict: OnceCell::new(),
        }
    }

    fn evaluate(&self, ctx: &RowContext<'_>) -> Result<Outcome> {
        for condition in &self.conditions {
            let table = ctx.datasets.table(&condition.table).ok_or_else(|| {
                ctx.configuration_error(format!(
                    "cross-table condition references unknown table '{}'",
                    condition.table
                ))
            })?;
            let satisfied = table
                .column_values(&condition.column)
                .any(|v| condition.operator.apply(v, &condition.value));
            if !satisfied {
                return Ok(Outcome::fail(format!(
                    "No row in {} has {} {} {}",
                    condition.table,
                    condition.column,
                    condition.operator.describe(),
                    condition.value
                ))
                .on_column(condition.column.clone()));
            }
        }
        Ok(Outcome::pass())
    }

    pub fn validate(&self, ctx: &RowContext<'_>) -> Result<Outcome> {
        self.verdict.get_or_try_init(|| self.evaluate(ctx)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{outcome_in, rule};
    use crate::value::CompareOp;
    use serde_json::json;

    fn shop() -> serde_json::Value {
        json!({
            "t": [
                {"userId": 1, "sku": "A", "size": "M"},
                {"userId": "2", "sku": "M", "size": "A"},
                {"userId": 9999, "sku": "B", "size": "XL"},
                {"userId": null, "sku": "A", "size": null}
            ],
            "users": [{"id": "1"}, {"id": 2}, {"id": 3}],
            "variants": [{"code": "A", "fit": "M"}, {"code": "B", "fit": "S"}]
        })
    }

    #[test]
    fn test_reference_integrity() {
        let r = rule(
            "reference-integrity",
            "userId",
            json!({"referenceTable": "users", "referenceColumn": "id"}),
        );
        assert!(outcome_in(&r, shop(), 0).unwrap().is_valid);
        assert!(outcome_in(&r, shop(), 1).unwrap().is_valid);
        let failed = outcome_in(&r, shop(), 2).unwrap();
        assert_eq!(
            failed.message.as_deref(),
            Some("Value 9999 in t.userId does not exist in users.id")
        );
        assert!(outcome_in(&r, shop(), 3).unwrap().is_valid);
    }

    #[test]
    fn test_reference_not_exists() {
        let r = rule(
            "reference-integrity",
            "userId",
            json!({"referenceTable": "users", "referenceColumn": "id", "checkType": "not-exists"}),
        );
        assert!(!outcome_in(&r, shop(), 0).unwrap().is_valid);
        assert!(outcome_in(&r, shop(), 2).unwrap().is_valid);
    }

    #[test]
    fn test_reference_configuration() {
        let unknown = rule(
            "reference-integrity",
            "userId",
            json!({"referenceTable": "accounts", "referenceColumn": "id"}),
        );
        assert!(outcome_in(&unknown, shop(), 0).unwrap_err().is_configuration());

        let missing = rule("reference-integrity", "userId", json!({"referenceTable": "users"}));
        assert!(outcome_in(&missing, shop(), 0).unwrap_err().is_configuration());
    }

    #[test]
    fn test_composite_reference_is_order_independent() {
        let r = rule(
            "composite-reference",
            "",
            json!({
                "sourceColumns": ["sku", "size"],
                "referenceTable": "variants",
                "referenceColumns": ["code", "fit"]
            }),
        );
        assert!(outcome_in(&r, shop(), 0).unwrap().is_valid);
        assert!(outcome_in(&r, shop(), 1).unwrap().is_valid);
        let failed = outcome_in(&r, shop(), 2).unwrap();
        assert_eq!(
            failed.message.as_deref(),
            Some("Combination (B, XL) in t.(sku, size) does not exist in variants.(code, fit)")
        );
        assert!(outcome_in(&r, shop(), 3).unwrap().is_valid);
    }

    #[test]
    fn test_composite_reference_distinct_counts() {
        let datasets = json!({
            "t": [{"a": "x", "b": "x"}],
            "ref": [{"p": "x", "q": "y"}]
        });
        let r = rule(
            "composite-reference",
            "",
            json!({"sourceColumns": "a,b", "referenceTable": "ref", "referenceColumns": "p,q"}),
        );
        assert!(!outcome_in(&r, datasets, 0).unwrap().is_valid);
    }

    #[test]
    fn test_composite_reference_length_mismatch() {
        let r = rule(
            "composite-reference",
            "",
            json!({"sourceColumns": ["sku"], "referenceTable": "variants", "referenceColumns": ["code", "fit"]}),
        );
        assert!(outcome_in(&r, shop(), 0).unwrap_err().is_configuration());
    }

    #[test]
    fn test_cross_table_conditions_are_cached() {
        let check = CrossTableCheck::new(vec![
            CrossTableCondition::new("users", "id", CompareOp::Gte, 3),
            CrossTableCondition::new("variants", "fit", CompareOp::Eq, "S"),
        ]);
        let datasets = crate::dataset::Datasets::from_json(shop()).unwrap();
        let table = datasets.table("t").unwrap();
        for (index, row) in table.rows().iter().enumerate() {
            let ctx = RowContext::new("rule", table, index, row, &datasets);
            assert!(check.validate(&ctx).unwrap().is_valid);
        }
        assert!(check.verdict.get().is_some());

        let failing = CrossTableCheck::new(vec![CrossTableCondition::new(
            "users",
            "id",
            CompareOp::Gt,
            10,
        )]);
        let ctx = RowContext::new("rule", table, 0, &table.rows()[0], &datasets);
        let outcome = failing.validate(&ctx).unwrap();
        assert_eq!(
            outcome.message.as_deref(),
            Some("No row in users has id greater than 10")
        );
        assert_eq!(outcome.column.as_deref(), Some("id"));
    }
}
