//! Input data: rows, tables, value lists and the combined input document.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::rules::Rule;
use crate::value::{Value, NULL};

/// One record: column name to value. Missing columns read as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `column`, or `null` when the column is missing.
    pub fn get(&self, column: &str) -> &Value {
        self.0.get(column).unwrap_or(&NULL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row(iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect())
    }
}

/// A named, ordered sequence of rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    name: String,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates over the values of one column, `null` where missing.
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().map(move |row| row.get(column))
    }
}

/// All tables of a validation run, keyed by name.
///
/// Serialized as `{ "<table>": [ {row}, ... ] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Vec<Row>>",
    into = "BTreeMap<String, Vec<Row>>"
)]
pub struct Datasets {
    tables: BTreeMap<String, Table>,
}

impl Datasets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses datasets from a JSON value.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(json)?)
    }

    /// Parses datasets from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Adds or replaces a table.
    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Builder-style insert.
    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.insert(Table::new(name, rows));
        self
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl From<BTreeMap<String, Vec<Row>>> for Datasets {
    fn from(map: BTreeMap<String, Vec<Row>>) -> Self {
        Self {
            tables: map
                .into_iter()
                .map(|(name, rows)| (name.clone(), Table::new(name, rows)))
                .collect(),
        }
    }
}

impl From<Datasets> for BTreeMap<String, Vec<Row>> {
    fn from(datasets: Datasets) -> Self {
        datasets
            .tables
            .into_iter()
            .map(|(name, table)| (name, table.rows))
            .collect()
    }
}

/// A named set of allowed string values referenced by `list` rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueList {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "stringified")]
    pub values: Vec<String>,
}

impl ValueList {
    pub fn new(id: impl Into<String>, name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            values,
        }
    }

    /// Exact membership of the stringified candidate.
    pub fn contains(&self, candidate: &str) -> bool {
        self.values.iter().any(|v| v == candidate)
    }
}

/// Finds a list by id, falling back to its name.
pub fn find_list<'a>(lists: &'a [ValueList], key: &str) -> Option<&'a ValueList> {
    lists
        .iter()
        .find(|list| list.id == key)
        .or_else(|| lists.iter().find(|list| list.name == key))
}

fn stringified<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw.iter().map(Value::to_string).collect())
}

/// The complete input contract: datasets, rules and value lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationInput {
    #[serde(default)]
    pub datasets: Datasets,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub value_lists: Vec<ValueList>,
}

impl ValidationInput {
    pub fn new(datasets: Datasets, rules: Vec<Rule>, value_lists: Vec<ValueList>) -> Self {
        Self {
            datasets,
            rules,
            value_lists,
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
