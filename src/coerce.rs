//! Column type coercion for parsed source files
//!
//! Raw cells arrive as text. Declared columns are converted to their semantic
//! type; a value that cannot be converted becomes [`Value::Missing`] instead
//! of failing the load.
//!
//! Boolean flag columns accept exactly these literals (case-insensitive,
//! surrounding whitespace ignored): `true`/`false`, `t`/`f`, `yes`/`no`,
//! `1`/`0`, plus native [`Value::Bool`] cells. Source files mix `TRUE`,
//! `FALSE` and native booleans in one column, so every form is accepted.
//! Anything else, including numbers other than 0/1, is missing.

use crate::table::{ColumnKind, ColumnSpec, Frame, Value};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

/// Slashed dates with the year last are month-first
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Convert a cell to an integer
#[must_use]
pub fn to_int(value: &Value) -> Value {
    match value {
        Value::Int(v) => Value::Int(*v),
        Value::Float(v) if v.fract() == 0.0 && v.is_finite() => Value::Int(*v as i64),
        Value::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0 && f.is_finite())
                        .map(|f| f as i64)
                })
                .map_or(Value::Missing, Value::Int)
        }
        _ => Value::Missing,
    }
}

/// Convert a cell to a float
#[must_use]
pub fn to_float(value: &Value) -> Value {
    match value {
        Value::Int(v) => Value::Float(*v as f64),
        Value::Float(v) if v.is_nan() => Value::Missing,
        Value::Float(v) => Value::Float(*v),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| !f.is_nan())
            .map_or(Value::Missing, Value::Float),
        _ => Value::Missing,
    }
}

/// Convert a cell to a calendar date; timestamps are truncated to their date
#[must_use]
pub fn to_date(value: &Value) -> Value {
    match value {
        Value::Date(d) => Value::Date(*d),
        Value::Text(s) => parse_date(s).map_or(Value::Missing, Value::Date),
        _ => Value::Missing,
    }
}

/// Parse a date or timestamp string
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Convert a cell to a boolean using the accepted literal set
#[must_use]
pub fn to_bool(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        Value::Int(1) => Value::Bool(true),
        Value::Int(0) => Value::Bool(false),
        Value::Text(s) => parse_bool(s).map_or(Value::Missing, Value::Bool),
        _ => Value::Missing,
    }
}

/// Parse a boolean literal from the accepted set
#[must_use]
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "1" => Some(true),
        "false" | "f" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Convert a text cell, turning blank strings into missing
#[must_use]
pub fn to_text(value: &Value) -> Value {
    match value {
        Value::Text(s) if s.trim().is_empty() => Value::Missing,
        Value::Text(s) => Value::Text(s.trim().to_string()),
        Value::Missing => Value::Missing,
        other => Value::Text(other.to_string()),
    }
}

/// Apply the coercion for `kind` to one cell
#[must_use]
pub fn coerce(value: &Value, kind: ColumnKind) -> Value {
    match kind {
        ColumnKind::Integer => to_int(value),
        ColumnKind::Float => to_float(value),
        ColumnKind::Date => to_date(value),
        ColumnKind::Bool => to_bool(value),
        ColumnKind::Text => to_text(value),
    }
}

/// Coerce every declared column present in `frame`; other columns are left as-is
pub fn coerce_frame(frame: &mut Frame, columns: &[ColumnSpec]) {
    for spec in columns {
        if !frame.has_column(spec.name) {
            continue;
        }
        let mut lost = 0usize;
        frame.map_column(spec.name, |v| {
            let coerced = coerce(v, spec.kind);
            if coerced.is_missing() && !v.is_missing() && !matches!(v, Value::Text(s) if s.trim().is_empty()) {
                lost += 1;
            }
            coerced
        });
        if lost > 0 {
            debug!(column = spec.name, count = lost, "Unparseable values coerced to missing");
        }
    }
}
