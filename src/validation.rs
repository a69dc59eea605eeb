//! Schema and range checks for loaded tables
//!
//! Checks run in a fixed order and the first failing category wins:
//! empty table, missing columns, column types, missing critical values,
//! non-positive values. Within a category every offending column is reported.

use crate::table::{Frame, Value};
use crate::{DashboardError, Result};
use tracing::debug;

/// Structural expectations for one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    required: Vec<String>,
    numeric: Vec<String>,
    critical: Vec<String>,
    positive: Vec<String>,
}

fn owned<I, S>(columns: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    columns.into_iter().map(Into::into)
}

impl Schema {
    /// Create an empty schema that accepts any non-empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns that must be present
    #[must_use]
    pub fn required<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(owned(columns));
        self
    }

    /// Columns whose non-missing values must all be numeric
    #[must_use]
    pub fn numeric<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.numeric.extend(owned(columns));
        self
    }

    /// Columns that may never contain missing values
    #[must_use]
    pub fn critical<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.critical.extend(owned(columns));
        self
    }

    /// Numeric columns whose values must be strictly greater than zero
    #[must_use]
    pub fn positive<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.positive.extend(owned(columns));
        self
    }

    #[must_use]
    pub fn required_columns(&self) -> &[String] {
        &self.required
    }
}

/// Validate `frame` against `schema`
///
/// Optional columns named by the numeric, critical or positive lists are only
/// checked when they are present.
pub fn validate(frame: &Frame, schema: &Schema) -> Result<()> {
    if frame.is_empty() {
        return Err(DashboardError::validation("DataFrame is empty"));
    }

    let missing: Vec<&str> = schema
        .required
        .iter()
        .filter(|c| !frame.has_column(c))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(DashboardError::missing_columns(
            missing,
            frame.columns().iter().map(String::as_str),
        ));
    }

    let non_numeric: Vec<&str> = schema
        .numeric
        .iter()
        .filter(|c| {
            frame.column(c).is_some_and(|mut values| {
                values.any(|v| !v.is_missing() && !v.is_numeric())
            })
        })
        .map(String::as_str)
        .collect();
    if !non_numeric.is_empty() {
        return Err(DashboardError::validation(format!(
            "Columns must be numeric: {}",
            non_numeric.join(", ")
        )));
    }

    let nulls = count_per_column(frame, &schema.critical, Value::is_missing);
    if !nulls.is_empty() {
        return Err(DashboardError::validation(format!(
            "Critical columns contain null values: {}",
            describe_counts(&nulls)
        )));
    }

    let non_positive = count_per_column(frame, &schema.positive, |v| {
        v.as_f64().is_some_and(|x| x <= 0.0)
    });
    if !non_positive.is_empty() {
        return Err(DashboardError::validation(format!(
            "Cost columns must contain values > 0: {}",
            describe_counts(&non_positive)
        )));
    }

    debug!(rows = frame.len(), "Table passed validation");
    Ok(())
}

fn count_per_column<'a, F>(frame: &Frame, columns: &'a [String], predicate: F) -> Vec<(&'a str, usize)>
where
    F: Fn(&Value) -> bool,
{
    columns
        .iter()
        .filter_map(|c| {
            let count = frame.column(c)?.filter(|v| predicate(v)).count();
            (count > 0).then_some((c.as_str(), count))
        })
        .collect()
}

fn describe_counts(counts: &[(&str, usize)]) -> String {
    counts
        .iter()
        .map(|(column, count)| format!("{column} ({count})"))
        .collect::<Vec<_>>()
        .join(", ")
}
