//! Payload Normalization
//!
//! Kiwoom transactions return heterogeneous JSON. This module reshapes them
//! into two targets:
//!
//! - [`Table`]: an array of records under a payload key becomes ordered
//!   columns plus rows. Mapped columns come first in mapping order, then any
//!   unmapped fields under their raw names in sorted order.
//! - [`NestedRecord`]: a flat record becomes a labeled summary plus a labeled
//!   list of per-instrument sub-records. [`LabeledRecord`] alone covers flat
//!   single-record responses.
//!
//! Label mappings are `(raw field, label)` pairs; see `transactions`.

use std::collections::BTreeSet;

use rust_decimal::prelude::ToPrimitive;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::holdings::parse_kiwoom_number;

/// `(raw field name, output label)` pairs.
pub type FieldLabels = &'static [(&'static str, &'static str)];

/// Normalization errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// Payload key absent.
    #[error("payload key `{0}` missing")]
    MissingKey(String),

    /// Payload key present but not an array.
    #[error("payload key `{0}` is not an array")]
    NotAnArray(String),

    /// Expected a JSON object.
    #[error("expected an object at `{0}`")]
    NotAnObject(String),

    /// Value could not be converted to an integer.
    #[error("column `{column}` has non-integer value {value}")]
    InvalidInteger {
        /// Raw column name.
        column: String,
        /// Offending value.
        value: String,
    },
}

/// Per-transaction table reshaping rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableRules {
    /// Rows removed from the end of each page.
    pub drop_trailing_rows: usize,
    /// Raw columns replaced by the absolute integer value.
    pub absolute_columns: &'static [&'static str],
}

// =============================================================================
// Table
// =============================================================================

/// Columns plus rows of JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Empty table with the given columns.
    #[must_use]
    pub const fn with_columns(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column labels in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows, each aligned with `columns()`.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column label.
    #[must_use]
    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }

    /// Cell at `row` under `label`.
    #[must_use]
    pub fn get(&self, row: usize, label: &str) -> Option<&Value> {
        let col = self.column_index(label)?;
        self.rows.get(row)?.get(col)
    }

    /// Append another table's rows, aligning by column label.
    ///
    /// Columns only present in `other` are added at the end; cells missing
    /// on either side are `null`.
    pub fn append(&mut self, other: Self) {
        let mut mapping = Vec::with_capacity(other.columns.len());
        for label in other.columns {
            if let Some(idx) = self.column_index(&label) {
                mapping.push(idx);
            } else {
                self.columns.push(label);
                for row in &mut self.rows {
                    row.push(Value::Null);
                }
                mapping.push(self.columns.len() - 1);
            }
        }

        for row in other.rows {
            let mut aligned = vec![Value::Null; self.columns.len()];
            for (value, &idx) in row.into_iter().zip(&mapping) {
                aligned[idx] = value;
            }
            self.rows.push(aligned);
        }
    }

    /// Rows as labeled records.
    #[must_use]
    pub fn records(&self) -> Vec<LabeledRecord> {
        self.rows
            .iter()
            .map(|row| LabeledRecord {
                fields: self.columns.iter().cloned().zip(row.iter().cloned()).collect(),
            })
            .collect()
    }
}

// =============================================================================
// Records
// =============================================================================

/// Ordered label/value pairs. Serializes as a JSON object in field order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledRecord {
    fields: Vec<(String, Value)>,
}

impl LabeledRecord {
    /// Value under `label`.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.fields.iter().find(|(l, _)| l == label).map(|(_, v)| v)
    }

    /// Labels in order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(l, _)| l.as_str())
    }

    /// Label/value pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(l, v)| (l.as_str(), v))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for LabeledRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (label, value) in &self.fields {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Summary fields plus a labeled list of sub-records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedRecord {
    /// Account-level fields.
    pub summary: LabeledRecord,
    /// Label the list is serialized under.
    pub list_label: String,
    /// Per-instrument records.
    pub items: Vec<LabeledRecord>,
}

impl Serialize for NestedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.summary.len() + 1))?;
        for (label, value) in &self.summary.fields {
            map.serialize_entry(label, value)?;
        }
        map.serialize_entry(&self.list_label, &self.items)?;
        map.end()
    }
}

// =============================================================================
// Reshaping
// =============================================================================

fn absolute_integer(column: &str, value: &Value) -> Result<Value, NormalizeError> {
    let invalid = || NormalizeError::InvalidInteger {
        column: column.to_string(),
        value: value.to_string(),
    };
    let parsed = match value {
        Value::String(s) => parse_kiwoom_number(s).map_err(|_| invalid())?,
        Value::Number(n) => n
            .as_i64()
            .map(rust_decimal::Decimal::from)
            .ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };
    if !parsed.fract().is_zero() {
        return Err(invalid());
    }
    parsed.abs().to_i64().map(Value::from).ok_or_else(invalid)
}

fn label_for(labels: FieldLabels, raw: &str) -> Option<&'static str> {
    labels.iter().find(|(r, _)| *r == raw).map(|(_, l)| *l)
}

/// Reshape the array under `key` into a table.
///
/// # Errors
///
/// Fails if `key` is absent or not an array of objects, or if an
/// absolute column holds a non-integer.
pub fn to_table(
    payload: &Value,
    key: &str,
    labels: FieldLabels,
    rules: TableRules,
) -> Result<Table, NormalizeError> {
    let array = payload
        .get(key)
        .ok_or_else(|| NormalizeError::MissingKey(key.to_string()))?
        .as_array()
        .ok_or_else(|| NormalizeError::NotAnArray(key.to_string()))?;

    let kept = array.len().saturating_sub(rules.drop_trailing_rows);
    let records: Vec<&Map<String, Value>> = array[..kept]
        .iter()
        .map(|v| {
            v.as_object()
                .ok_or_else(|| NormalizeError::NotAnObject(key.to_string()))
        })
        .collect::<Result<_, _>>()?;

    let present: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .collect();

    let mut raw_columns: Vec<&str> = labels
        .iter()
        .map(|(raw, _)| *raw)
        .filter(|raw| present.contains(raw))
        .collect();
    raw_columns.extend(
        present
            .iter()
            .copied()
            .filter(|raw| label_for(labels, raw).is_none()),
    );

    let columns = raw_columns
        .iter()
        .map(|raw| label_for(labels, raw).unwrap_or(raw).to_string())
        .collect();

    let mut table = Table::with_columns(columns);
    for record in records {
        let row = raw_columns
            .iter()
            .map(|raw| {
                let value = record.get(*raw).cloned().unwrap_or(Value::Null);
                if rules.absolute_columns.contains(raw) && !value.is_null() {
                    absolute_integer(raw, &value)
                } else {
                    Ok(value)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        table.rows.push(row);
    }

    Ok(table)
}

/// Project an object onto the mapped fields, in mapping order.
///
/// Fields absent from `record` are skipped.
#[must_use]
pub fn to_labeled(record: &Map<String, Value>, labels: FieldLabels) -> LabeledRecord {
    LabeledRecord {
        fields: labels
            .iter()
            .filter_map(|(raw, label)| record.get(*raw).map(|v| ((*label).to_string(), v.clone())))
            .collect(),
    }
}

/// Reshape a flat payload into a summary plus labeled sub-records.
///
/// # Errors
///
/// Fails if the payload is not an object, or `list_key` is present but not
/// an array of objects. An absent `list_key` yields no items.
pub fn to_nested(
    payload: &Value,
    summary_labels: FieldLabels,
    list_key: &str,
    list_label: &str,
    item_labels: FieldLabels,
) -> Result<NestedRecord, NormalizeError> {
    let object = payload
        .as_object()
        .ok_or_else(|| NormalizeError::NotAnObject("$".to_string()))?;

    let items = match object.get(list_key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| {
                entry
                    .as_object()
                    .map(|o| to_labeled(o, item_labels))
                    .ok_or_else(|| NormalizeError::NotAnObject(list_key.to_string()))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(NormalizeError::NotAnArray(list_key.to_string())),
    };

    Ok(NestedRecord {
        summary: to_labeled(object, summary_labels),
        list_label: list_label.to_string(),
        items,
    })
}
