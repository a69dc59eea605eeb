//! Declarative row filters
//!
//! A [`Filter`] is a list of predicates that are ANDed together. Applying it
//! never mutates the input and never fails on an empty result: the output
//! keeps the input's column structure with zero or more rows.
//!
//! Missing values never satisfy a range, threshold or flag predicate. An
//! empty membership set keeps every row.

use crate::table::{Tabular, Value};
use crate::{DashboardError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One condition on a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Inclusive date range; either bound may be omitted
    DateRange {
        column: String,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    /// Value must be one of `values`; an empty set is no filter
    OneOf { column: String, values: Vec<Value> },
    /// Inclusive numeric bounds; either bound may be omitted
    Threshold {
        column: String,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Boolean column must equal `value`
    Flag { column: String, value: bool },
}

impl Predicate {
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Predicate::DateRange { column, .. }
            | Predicate::OneOf { column, .. }
            | Predicate::Threshold { column, .. }
            | Predicate::Flag { column, .. } => column,
        }
    }

    /// Whether the predicate removes nothing regardless of the data
    fn is_noop(&self) -> bool {
        match self {
            Predicate::OneOf { values, .. } => values.is_empty(),
            Predicate::DateRange { start, end, .. } => start.is_none() && end.is_none(),
            Predicate::Threshold { min, max, .. } => min.is_none() && max.is_none(),
            Predicate::Flag { .. } => false,
        }
    }

    /// Evaluate the predicate against one cell
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Predicate::DateRange { start, end, .. } => value.as_date().is_some_and(|d| {
                start.is_none_or(|s| d >= s) && end.is_none_or(|e| d <= e)
            }),
            Predicate::OneOf { values, .. } => {
                values.is_empty() || values.iter().any(|v| same_value(v, value))
            }
            Predicate::Threshold { min, max, .. } => value.as_f64().is_some_and(|x| {
                min.is_none_or(|m| x >= m) && max.is_none_or(|m| x <= m)
            }),
            Predicate::Flag { value: wanted, .. } => value.as_bool() == Some(*wanted),
        }
    }
}

/// Equality that treats integers and floats with the same magnitude as equal
fn same_value(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// A conjunction of predicates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    /// Create a filter that keeps every row
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Keep rows whose date in `column` lies within `[start, end]`
    #[must_use]
    pub fn date_range(self, column: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.with(Predicate::DateRange {
            column: column.to_string(),
            start,
            end,
        })
    }

    /// Keep rows whose value in `column` is one of `values`
    #[must_use]
    pub fn one_of<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with(Predicate::OneOf {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// Keep rows whose number in `column` lies within `[min, max]`
    #[must_use]
    pub fn between(self, column: &str, min: Option<f64>, max: Option<f64>) -> Self {
        self.with(Predicate::Threshold {
            column: column.to_string(),
            min,
            max,
        })
    }

    #[must_use]
    pub fn at_least(self, column: &str, min: f64) -> Self {
        self.between(column, Some(min), None)
    }

    #[must_use]
    pub fn at_most(self, column: &str, max: f64) -> Self {
        self.between(column, None, Some(max))
    }

    /// Keep rows whose boolean in `column` equals `value`
    #[must_use]
    pub fn flag(self, column: &str, value: bool) -> Self {
        self.with(Predicate::Flag {
            column: column.to_string(),
            value,
        })
    }

    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.iter().all(Predicate::is_noop)
    }

    /// Whether row `row` of `table` satisfies every predicate
    fn row_matches<T: Tabular>(&self, table: &T, row: usize) -> bool {
        self.predicates.iter().all(|p| {
            table
                .cell(row, p.column())
                .is_some_and(|value| p.matches(&value))
        })
    }

    /// Apply the filter, returning a new table
    ///
    /// Fails only when a predicate names a column the table does not have.
    pub fn apply<T: Tabular>(&self, table: &T) -> Result<T> {
        let unknown: Vec<&str> = self
            .predicates
            .iter()
            .map(Predicate::column)
            .filter(|c| !table.contains_column(c))
            .collect();
        if !unknown.is_empty() {
            return Err(DashboardError::missing_columns(unknown, table.column_names()));
        }

        let active = Filter {
            predicates: self
                .predicates
                .iter()
                .filter(|p| !p.is_noop())
                .cloned()
                .collect(),
        };
        let rows: Vec<usize> = (0..table.row_count())
            .filter(|&row| active.row_matches(table, row))
            .collect();
        tracing::debug!(
            before = table.row_count(),
            after = rows.len(),
            "Filter applied"
        );
        Ok(table.take_rows(&rows))
    }
}
