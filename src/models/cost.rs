//! Cost-of-living snapshot model

use crate::models::Dataset;
use crate::table::{ColumnKind, ColumnSpec, Frame, Record, RowReader, Value};
use crate::validation::Schema;
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One cost-of-living snapshot for a destination
///
/// Several snapshots may exist per destination; the current cost is the one
/// with the latest `data_date`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CostRecord {
    pub destination_id: i64,
    pub data_date: NaiveDate,
    /// ISO 4217 currency code
    pub currency: Option<String>,
    pub monthly_living_cost: Option<f64>,
    pub rent_1br_center: Option<f64>,
    pub monthly_food: Option<f64>,
    pub monthly_transport: Option<f64>,
    pub utilities: Option<f64>,
    pub entertainment: Option<f64>,
    pub meal_inexpensive: Option<f64>,
    pub meal_mid_range: Option<f64>,
    pub beer: Option<f64>,
    pub coffee: Option<f64>,
    pub public_transport: Option<f64>,
    pub data_source: String,
}

impl CostRecord {
    /// Create a new snapshot with a monthly total and no breakdown
    #[must_use]
    pub fn new(destination_id: i64, data_date: NaiveDate, monthly_living_cost: f64, data_source: &str) -> Self {
        Self {
            destination_id,
            data_date,
            currency: Some("EUR".to_string()),
            monthly_living_cost: Some(monthly_living_cost),
            rent_1br_center: None,
            monthly_food: None,
            monthly_transport: None,
            utilities: None,
            entertainment: None,
            meal_inexpensive: None,
            meal_mid_range: None,
            beer: None,
            coffee: None,
            public_transport: None,
            data_source: data_source.to_string(),
        }
    }
}

/// Columns whose values must be strictly positive
pub const COST_COLUMNS: &[&str] = &[
    "monthly_living_cost",
    "rent_1br_center",
    "monthly_food",
    "monthly_transport",
    "utilities",
    "entertainment",
    "meal_inexpensive",
    "meal_mid_range",
    "beer",
    "coffee",
    "public_transport",
];

const COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::new("destination_id", ColumnKind::Integer),
    ColumnSpec::new("data_date", ColumnKind::Date),
    ColumnSpec::new("currency", ColumnKind::Text),
    ColumnSpec::new("monthly_living_cost", ColumnKind::Float),
    ColumnSpec::new("rent_1br_center", ColumnKind::Float),
    ColumnSpec::new("monthly_food", ColumnKind::Float),
    ColumnSpec::new("monthly_transport", ColumnKind::Float),
    ColumnSpec::new("utilities", ColumnKind::Float),
    ColumnSpec::new("entertainment", ColumnKind::Float),
    ColumnSpec::new("meal_inexpensive", ColumnKind::Float),
    ColumnSpec::new("meal_mid_range", ColumnKind::Float),
    ColumnSpec::new("beer", ColumnKind::Float),
    ColumnSpec::new("coffee", ColumnKind::Float),
    ColumnSpec::new("public_transport", ColumnKind::Float),
    ColumnSpec::new("data_source", ColumnKind::Text),
];

impl Record for CostRecord {
    const DATASET: Dataset = Dataset::Costs;
    const COLUMNS: &'static [ColumnSpec] = COLUMNS;

    fn schema() -> Schema {
        Schema::new()
            .required(["destination_id", "data_date", "monthly_living_cost", "data_source"])
            .numeric(COST_COLUMNS.iter().copied().chain(["destination_id"]))
            .critical(["destination_id", "data_date", "data_source"])
            .positive(COST_COLUMNS.iter().copied())
    }

    fn from_row(frame: &Frame, row: usize) -> Result<Self> {
        let r = RowReader::new(frame, row);
        Ok(Self {
            destination_id: r.int("destination_id")?,
            data_date: r.date("data_date")?,
            currency: r.opt_text("currency"),
            monthly_living_cost: r.opt_float("monthly_living_cost"),
            rent_1br_center: r.opt_float("rent_1br_center"),
            monthly_food: r.opt_float("monthly_food"),
            monthly_transport: r.opt_float("monthly_transport"),
            utilities: r.opt_float("utilities"),
            entertainment: r.opt_float("entertainment"),
            meal_inexpensive: r.opt_float("meal_inexpensive"),
            meal_mid_range: r.opt_float("meal_mid_range"),
            beer: r.opt_float("beer"),
            coffee: r.opt_float("coffee"),
            public_transport: r.opt_float("public_transport"),
            data_source: r.text("data_source")?,
        })
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.destination_id.into(),
            self.data_date.into(),
            self.currency.clone().into(),
            self.monthly_living_cost.into(),
            self.rent_1br_center.into(),
            self.monthly_food.into(),
            self.monthly_transport.into(),
            self.utilities.into(),
            self.entertainment.into(),
            self.meal_inexpensive.into(),
            self.meal_mid_range.into(),
            self.beer.into(),
            self.coffee.into(),
            self.public_transport.into(),
            self.data_source.as_str().into(),
        ]
    }

    fn data_source(&self) -> Option<&str> {
        Some(&self.data_source)
    }
}
