//! Tabular data structures
//!
//! Two representations live here:
//! - [`Table<R>`]: an ordered collection of typed records for one dataset
//! - [`Frame`]: a dynamic table with an explicit column order, used for raw
//!   parsed files and for derived results (merges, aggregates) whose columns
//!   depend on the inputs
//!
//! Both implement [`Tabular`], which is what the filter engine operates on.

use crate::models::Dataset;
use crate::validation::Schema;
use crate::{DashboardError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Missing,
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// True for integer and floating point values
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numeric view of the value; integers widen to `f64`
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Value {
    /// Plain JSON rendering; non-finite floats become `null`
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Missing => serde_json::Value::Null,
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v).map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Date(_) | Value::Text(_) => serde_json::Value::String(self.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Missing, Into::into)
    }
}

/// Semantic type of a declared column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Date,
    Bool,
    Text,
}

/// A declared column of a typed dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    #[must_use]
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

/// Dynamic table with an explicit column order
///
/// Serializes as `{ columns, rows }` so that reconstruction never depends on
/// map key ordering.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Create an empty frame with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Create a frame from columns and rows, checking every row's width
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut frame = Self::new(columns);
        for row in rows {
            frame.push_row(row)?;
        }
        Ok(frame)
    }

    /// Append a row; its width must match the column count
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DashboardError::validation(format!(
                "row has {} values but frame has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// All values of one column, in row order
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Value at `row` for column `name`
    #[must_use]
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Rename a column in place; no-op when the column is absent
    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some(idx) = self.column_index(from) {
            self.columns[idx] = to.to_string();
        }
    }

    /// Rewrite every value of one column; no-op when the column is absent
    pub fn map_column<F>(&mut self, name: &str, mut f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        if let Some(idx) = self.column_index(name) {
            for row in &mut self.rows {
                row[idx] = f(&row[idx]);
            }
        }
    }

    /// New frame holding the given rows, in the given order
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Frame {
        Frame {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Rows as JSON objects keyed by column name, in column order; missing
    /// cells become `null`
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(Value::to_json))
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }

    /// New frame restricted to the named columns, in the given order
    pub fn project(&self, names: &[&str]) -> Result<Frame> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| !self.has_column(n))
            .collect();
        if !missing.is_empty() {
            return Err(DashboardError::missing_columns(
                missing,
                self.columns.iter().map(String::as_str),
            ));
        }
        let indices: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        Ok(Frame {
            columns: names.iter().map(|n| (*n).to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }
}

/// A typed record of one dataset
pub trait Record: Clone + Sized {
    /// Dataset this record type belongs to
    const DATASET: Dataset;

    /// Declared columns, in file order
    const COLUMNS: &'static [ColumnSpec];

    /// Structural checks a raw frame must pass before records are built
    fn schema() -> Schema;

    /// Build a record from row `row` of a coerced, validated frame
    fn from_row(frame: &Frame, row: usize) -> Result<Self>;

    /// Values in `COLUMNS` order
    fn to_row(&self) -> Vec<Value>;

    /// Provenance tag, for datasets that carry one
    fn data_source(&self) -> Option<&str> {
        None
    }

    /// Value of a single declared column
    fn value(&self, column: &str) -> Option<Value> {
        let idx = Self::COLUMNS.iter().position(|c| c.name == column)?;
        self.to_row().into_iter().nth(idx)
    }

    #[must_use]
    fn column_names() -> Vec<&'static str> {
        Self::COLUMNS.iter().map(|c| c.name).collect()
    }
}

/// Field accessor over one row of a frame, used by `Record::from_row`
pub struct RowReader<'a> {
    frame: &'a Frame,
    row: usize,
}

impl<'a> RowReader<'a> {
    #[must_use]
    pub fn new(frame: &'a Frame, row: usize) -> Self {
        Self { frame, row }
    }

    fn get(&self, column: &str) -> &'a Value {
        static MISSING: Value = Value::Missing;
        self.frame.value(self.row, column).unwrap_or(&MISSING)
    }

    fn required<T>(&self, column: &str, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| {
            DashboardError::validation(format!(
                "row {}: column {column} has no usable value",
                self.row
            ))
        })
    }

    pub fn int(&self, column: &str) -> Result<i64> {
        self.required(column, self.get(column).as_i64())
    }

    pub fn float(&self, column: &str) -> Result<f64> {
        self.required(column, self.get(column).as_f64())
    }

    pub fn date(&self, column: &str) -> Result<NaiveDate> {
        self.required(column, self.get(column).as_date())
    }

    pub fn text(&self, column: &str) -> Result<String> {
        self.required(column, self.get(column).as_str().map(str::to_string))
    }

    #[must_use]
    pub fn opt_int(&self, column: &str) -> Option<i64> {
        self.get(column).as_i64()
    }

    #[must_use]
    pub fn opt_float(&self, column: &str) -> Option<f64> {
        self.get(column).as_f64()
    }

    #[must_use]
    pub fn opt_date(&self, column: &str) -> Option<NaiveDate> {
        self.get(column).as_date()
    }

    #[must_use]
    pub fn opt_bool(&self, column: &str) -> Option<bool> {
        self.get(column).as_bool()
    }

    #[must_use]
    pub fn opt_text(&self, column: &str) -> Option<String> {
        self.get(column).as_str().map(str::to_string)
    }
}

/// Ordered collection of typed records for one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table<R> {
    records: Vec<R>,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<R: Record> Table<R> {
    #[must_use]
    pub fn new(records: Vec<R>) -> Self {
        Self { records }
    }

    /// Build typed records from every row of a coerced frame
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let records = (0..frame.len())
            .map(|row| R::from_row(frame, row))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { records })
    }

    #[must_use]
    pub fn records(&self) -> &[R] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<R> {
        self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// New table with the records matching `predicate`
    #[must_use]
    pub fn filtered<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&R) -> bool,
    {
        Self {
            records: self.records.iter().filter(|r| predicate(r)).cloned().collect(),
        }
    }

    /// New table with the records whose provenance tag equals `tag`
    #[must_use]
    pub fn with_source(&self, tag: &str) -> Self {
        self.filtered(|r| r.data_source() == Some(tag))
    }

    /// Columnar view with the declared column order
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        Frame {
            columns: R::COLUMNS.iter().map(|c| c.name.to_string()).collect(),
            rows: self.records.iter().map(Record::to_row).collect(),
        }
    }
}

impl<'a, R: Record> IntoIterator for &'a Table<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Row/column access shared by frames and typed tables
pub trait Tabular: Sized {
    fn column_names(&self) -> Vec<String>;

    fn row_count(&self) -> usize;

    fn cell(&self, row: usize, column: &str) -> Option<Value>;

    /// New table with the given rows in order; columns are unchanged
    fn take_rows(&self, rows: &[usize]) -> Self;

    fn contains_column(&self, column: &str) -> bool {
        self.column_names().iter().any(|c| c == column)
    }
}

impl Tabular for Frame {
    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn row_count(&self) -> usize {
        self.len()
    }

    fn cell(&self, row: usize, column: &str) -> Option<Value> {
        self.value(row, column).cloned()
    }

    fn take_rows(&self, rows: &[usize]) -> Self {
        self.select_rows(rows)
    }
}

impl<R: Record> Tabular for Table<R> {
    fn column_names(&self) -> Vec<String> {
        R::COLUMNS.iter().map(|c| c.name.to_string()).collect()
    }

    fn row_count(&self) -> usize {
        self.len()
    }

    fn cell(&self, row: usize, column: &str) -> Option<Value> {
        self.records.get(row).and_then(|r| r.value(column))
    }

    fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            records: rows
                .iter()
                .filter_map(|&i| self.records.get(i).cloned())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_rows(
            ["destination_id", "name", "price"],
            vec![
                vec![Value::Int(1), "Alicante".into(), Value::Float(89.5)],
                vec![Value::Int(2), "Malaga".into(), Value::Missing],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_frame_to_json() {
        let json = sample().to_json();
        assert_eq!(
            json,
            serde_json::json!([
                {"destination_id": 1, "name": "Alicante", "price": 89.5},
                {"destination_id": 2, "name": "Malaga", "price": null},
            ])
        );
    }

    #[test]
    fn test_to_json_keeps_column_order() {
        let json = sample().project(&["price", "name", "destination_id"]).unwrap().to_json();
        let keys: Vec<&str> = json[0].as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["price", "name", "destination_id"]);
    }

    #[test]
    fn test_push_row_rejects_wrong_width() {
        let mut frame = Frame::new(["a", "b"]);
        assert!(frame.push_row(vec![Value::Int(1)]).is_err());
        assert!(frame.push_row(vec![Value::Int(1), Value::Int(2)]).is_ok());
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn test_column_access() {
        let frame = sample();
        assert_eq!(frame.column_index("price"), Some(2));
        assert_eq!(frame.value(0, "name"), Some(&Value::from("Alicante")));
        let prices: Vec<&Value> = frame.column("price").unwrap().collect();
        assert_eq!(prices, vec![&Value::Float(89.5), &Value::Missing]);
        assert!(frame.column("nope").is_none());
    }

    #[test]
    fn test_project_reports_missing_columns() {
        let frame = sample();
        let projected = frame.project(&["name", "destination_id"]).unwrap();
        assert_eq!(projected.columns(), ["name", "destination_id"]);
        assert_eq!(projected.value(1, "name"), Some(&Value::from("Malaga")));

        let err = frame.project(&["name", "airline"]).unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumns { ref missing, .. } if missing == &["airline"]));
    }

    #[test]
    fn test_select_rows_keeps_structure_when_empty() {
        let frame = sample();
        let empty = frame.select_rows(&[]);
        assert!(empty.is_empty());
        assert_eq!(empty.columns(), frame.columns());
    }

    #[test]
    fn test_rename_and_map_column() {
        let mut frame = sample();
        frame.rename_column("price", "fare");
        frame.map_column("fare", |v| Value::from(v.as_f64().map(|p| p * 2.0)));
        assert_eq!(frame.value(0, "fare"), Some(&Value::Float(179.0)));
        assert_eq!(frame.value(1, "fare"), Some(&Value::Missing));
    }

    #[test]
    fn test_value_display() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 5).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2025-10-05");
        assert_eq!(Value::Missing.to_string(), "");
        assert_eq!(Value::from(Some(3_i64)).to_string(), "3");
    }

    #[test]
    fn test_frame_json_keeps_column_order() {
        let frame = sample();
        let json = serde_json::to_string(&frame).unwrap();
        let restored: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.columns(), ["destination_id", "name", "price"]);
        assert_eq!(restored, frame);
    }
}
