use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, StringArray, TimestampMillisecondArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use tracing::{debug, instrument};

use crate::dataset::{Datasets, Row, Table};
use crate::error::{GuardError, Result};
use crate::value::Value;

/// How one Arrow column maps onto [`Value`]s.
enum ColumnReader {
    Null,
    Bool(BooleanArray),
    Number(Float64Array),
    Text(StringArray),
    Date(TimestampMillisecondArray),
}

impl ColumnReader {
    fn new(name: &str, array: &ArrayRef) -> Result<Self> {
        let data_type = array.data_type();
        let reader = match data_type {
            DataType::Null => Self::Null,
            DataType::Boolean => Self::Bool(downcast::<BooleanArray>(name, &cast(array, &DataType::Boolean)?)?),
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
                Self::Text(downcast::<StringArray>(name, &cast(array, &DataType::Utf8)?)?)
            }
            t if t.is_numeric() => {
                Self::Number(downcast::<Float64Array>(name, &cast(array, &DataType::Float64)?)?)
            }
            DataType::Date32 | DataType::Date64 => {
                let target = DataType::Timestamp(TimeUnit::Millisecond, None);
                Self::Date(downcast::<TimestampMillisecondArray>(name, &cast(array, &target)?)?)
            }
            DataType::Timestamp(_, tz) => {
                // keep the zone so raw values stay UTC epoch millis
                let target = DataType::Timestamp(TimeUnit::Millisecond, tz.clone());
                Self::Date(downcast::<TimestampMillisecondArray>(name, &cast(array, &target)?)?)
            }
            other => {
                return Err(GuardError::TypeMismatch {
                    expected: format!(
                        "utf8, numeric, boolean, date or timestamp column for '{name}'"
                    ),
                    found: other.to_string(),
                })
            }
        };
        Ok(reader)
    }

    fn value(&self, index: usize) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(a) if !a.is_null(index) => Value::Bool(a.value(index)),
            Self::Number(a) if !a.is_null(index) => Value::Number(a.value(index)),
            Self::Text(a) if !a.is_null(index) => Value::String(a.value(index).to_string()),
            Self::Date(a) if !a.is_null(index) => {
                a.value_as_datetime(index).map_or(Value::Null, Value::Date)
            }
            _ => Value::Null,
        }
    }
}

fn downcast<A: Array + Clone + 'static>(name: &str, array: &ArrayRef) -> Result<A> {
    array
        .as_any()
        .downcast_ref::<A>()
        .cloned()
        .ok_or_else(|| GuardError::Internal(format!("unexpected array layout for column '{name}'")))
}

/// Converts record batches into a row-oriented [`Table`].
///
/// Numeric columns become `f64`, date and timestamp columns become naive
/// UTC datetimes and Arrow nulls become [`Value::Null`]. Batches are appended
/// in order; each batch is read with its own schema.
///
/// # Errors
///
/// Returns [`GuardError::TypeMismatch`] for column types without a [`Value`]
/// counterpart (lists, structs, binary, ...).
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use arrow::array::{Int64Array, StringArray};
/// use arrow::datatypes::{DataType, Field, Schema};
/// use arrow::record_batch::RecordBatch;
/// use rule_guard::sources::table_from_batches;
///
/// let schema = Arc::new(Schema::new(vec![
///     Field::new("id", DataType::Int64, false),
///     Field::new("email", DataType::Utf8, true),
/// ]));
/// let batch = RecordBatch::try_new(
///     schema,
///     vec![
///         Arc::new(Int64Array::from(vec![1, 2])),
///         Arc::new(StringArray::from(vec![Some("a@example.com"), None])),
///     ],
/// )
/// .unwrap();
///
/// let table = table_from_batches("users", &[batch]).unwrap();
/// assert_eq!(table.len(), 2);
/// assert!(table.rows()[1].get("email").is_null());
/// ```
#[instrument(skip(batches), fields(batches = batches.len()))]
pub fn table_from_batches(name: &str, batches: &[RecordBatch]) -> Result<Table> {
    let mut rows = Vec::with_capacity(batches.iter().map(RecordBatch::num_rows).sum());

    for batch in batches {
        let schema = batch.schema();
        let readers = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, array)| Ok((field.name().clone(), ColumnReader::new(field.name(), array)?)))
            .collect::<Result<Vec<_>>>()?;

        for index in 0..batch.num_rows() {
            let mut row = Row::new();
            for (column, reader) in &readers {
                row.insert(column.clone(), reader.value(index));
            }
            rows.push(row);
        }
    }

    debug!(rows = rows.len(), "Loaded table from record batches");
    Ok(Table::new(name, rows))
}

/// Loads `batches` as table `name` into `datasets`, replacing any table of the
/// same name.
pub fn insert_batches(datasets: &mut Datasets, name: &str, batches: &[RecordBatch]) -> Result<()> {
    datasets.insert(table_from_batches(name, batches)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Date32Array, Int32Array, ListArray, NullArray, TimestampSecondArray};
    use arrow::datatypes::{Field, Int32Type, Schema};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn batch(fields: Vec<Field>, columns: Vec<ArrayRef>) -> RecordBatch {
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
    }

    #[test]
    fn test_table_from_batches_maps_column_types() {
        let batch = batch(
            vec![
                Field::new("qty", DataType::Int32, true),
                Field::new("active", DataType::Boolean, false),
                Field::new("sku", DataType::Utf8, false),
                Field::new("note", DataType::Null, true),
            ],
            vec![
                Arc::new(Int32Array::from(vec![Some(3), None])),
                Arc::new(BooleanArray::from(vec![true, false])),
                Arc::new(StringArray::from(vec!["A-1", "B-2"])),
                Arc::new(NullArray::new(2)),
            ],
        );

        let table = table_from_batches("items", &[batch]).unwrap();
        assert_eq!(table.name(), "items");
        assert_eq!(table.len(), 2);

        let first = &table.rows()[0];
        assert_eq!(first.get("qty"), &Value::Number(3.0));
        assert_eq!(first.get("active"), &Value::Bool(true));
        assert_eq!(first.get("sku"), &Value::String("A-1".into()));
        assert!(first.get("note").is_null());
        assert!(table.rows()[1].get("qty").is_null());
    }

    #[test]
    fn test_table_from_batches_converts_dates() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let days_since_epoch = (day - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32;
        let noon = day.and_hms_opt(12, 30, 0).unwrap();

        let batch = batch(
            vec![
                Field::new("due", DataType::Date32, false),
                Field::new(
                    "seen",
                    DataType::Timestamp(TimeUnit::Second, Some("UTC".into())),
                    false,
                ),
            ],
            vec![
                Arc::new(Date32Array::from(vec![days_since_epoch])),
                Arc::new(
                    TimestampSecondArray::from(vec![noon.and_utc().timestamp()]).with_timezone("UTC"),
                ),
            ],
        );

        let table = table_from_batches("events", &[batch]).unwrap();
        let row = &table.rows()[0];
        assert_eq!(row.get("due"), &Value::Date(day.and_hms_opt(0, 0, 0).unwrap()));
        assert_eq!(row.get("seen"), &Value::Date(noon));
    }

    #[test]
    fn test_table_from_batches_appends_batches() {
        let make = |ids: Vec<i32>| {
            batch(
                vec![Field::new("id", DataType::Int32, false)],
                vec![Arc::new(Int32Array::from(ids))],
            )
        };

        let mut datasets = Datasets::new();
        insert_batches(&mut datasets, "ids", &[make(vec![1, 2]), make(vec![3])]).unwrap();

        let values: Vec<f64> = datasets
            .table("ids")
            .unwrap()
            .column_values("id")
            .filter_map(Value::as_number)
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_table_from_batches_rejects_nested_columns() {
        let list = ListArray::from_iter_primitive::<Int32Type, _, _>(vec![Some(vec![Some(1)])]);
        let batch = batch(
            vec![Field::new("tags", list.data_type().clone(), true)],
            vec![Arc::new(list)],
        );

        let err = table_from_batches("t", &[batch]).unwrap_err();
        assert!(matches!(err, GuardError::TypeMismatch { .. }));
        assert!(err.to_string().contains("'tags'"));
    }
}
