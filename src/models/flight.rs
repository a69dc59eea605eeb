//! Flight price quote model

use crate::models::Dataset;
use crate::table::{ColumnKind, ColumnSpec, Frame, Record, RowReader, Value};
use crate::validation::Schema;
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One priced round-trip flight option
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FlightQuote {
    pub flight_id: i64,
    pub destination_id: i64,
    pub origin_airport: Option<String>,
    /// Day the price was observed
    pub search_date: NaiveDate,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub duration_hours: Option<f64>,
    pub distance_km: Option<f64>,
    pub airline: Option<String>,
    pub direct_flight: Option<bool>,
    pub data_source: String,
}

impl FlightQuote {
    /// Create a new quote with the fields every caller needs
    #[must_use]
    pub fn new(
        flight_id: i64,
        destination_id: i64,
        search_date: NaiveDate,
        departure_date: NaiveDate,
        price: f64,
        data_source: &str,
    ) -> Self {
        Self {
            flight_id,
            destination_id,
            origin_airport: None,
            search_date,
            departure_date,
            return_date: None,
            price: Some(price),
            currency: Some("EUR".to_string()),
            duration_hours: None,
            distance_km: None,
            airline: None,
            direct_flight: None,
            data_source: data_source.to_string(),
        }
    }

    /// Nights between departure and return, when a return date is known
    #[must_use]
    pub fn trip_length_days(&self) -> Option<i64> {
        self.return_date
            .map(|ret| (ret - self.departure_date).num_days())
    }
}

const COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::new("flight_id", ColumnKind::Integer),
    ColumnSpec::new("destination_id", ColumnKind::Integer),
    ColumnSpec::new("origin_airport", ColumnKind::Text),
    ColumnSpec::new("search_date", ColumnKind::Date),
    ColumnSpec::new("departure_date", ColumnKind::Date),
    ColumnSpec::new("return_date", ColumnKind::Date),
    ColumnSpec::new("price", ColumnKind::Float),
    ColumnSpec::new("currency", ColumnKind::Text),
    ColumnSpec::new("duration_hours", ColumnKind::Float),
    ColumnSpec::new("distance_km", ColumnKind::Float),
    ColumnSpec::new("airline", ColumnKind::Text),
    ColumnSpec::new("direct_flight", ColumnKind::Bool),
    ColumnSpec::new("data_source", ColumnKind::Text),
];

impl Record for FlightQuote {
    const DATASET: Dataset = Dataset::Flights;
    const COLUMNS: &'static [ColumnSpec] = COLUMNS;

    fn schema() -> Schema {
        Schema::new()
            .required([
                "flight_id",
                "destination_id",
                "search_date",
                "departure_date",
                "price",
                "data_source",
            ])
            .numeric(["flight_id", "destination_id", "price", "duration_hours", "distance_km"])
            .critical([
                "flight_id",
                "destination_id",
                "search_date",
                "departure_date",
                "data_source",
            ])
            .positive(["price"])
    }

    fn from_row(frame: &Frame, row: usize) -> Result<Self> {
        let r = RowReader::new(frame, row);
        Ok(Self {
            flight_id: r.int("flight_id")?,
            destination_id: r.int("destination_id")?,
            origin_airport: r.opt_text("origin_airport"),
            search_date: r.date("search_date")?,
            departure_date: r.date("departure_date")?,
            return_date: r.opt_date("return_date"),
            price: r.opt_float("price"),
            currency: r.opt_text("currency"),
            duration_hours: r.opt_float("duration_hours"),
            distance_km: r.opt_float("distance_km"),
            airline: r.opt_text("airline"),
            direct_flight: r.opt_bool("direct_flight"),
            data_source: r.text("data_source")?,
        })
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.flight_id.into(),
            self.destination_id.into(),
            self.origin_airport.clone().into(),
            self.search_date.into(),
            self.departure_date.into(),
            self.return_date.into(),
            self.price.into(),
            self.currency.clone().into(),
            self.duration_hours.into(),
            self.distance_km.into(),
            self.airline.clone().into(),
            self.direct_flight.into(),
            self.data_source.as_str().into(),
        ]
    }

    fn data_source(&self) -> Option<&str> {
        Some(&self.data_source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, day).unwrap()
    }

    #[test]
    fn test_trip_length() {
        let mut quote = FlightQuote::new(1, 1, date(4), date(11), 89.0, "demo1");
        assert_eq!(quote.trip_length_days(), None);
        quote.return_date = Some(date(18));
        assert_eq!(quote.trip_length_days(), Some(7));
    }

    #[test]
    fn test_direct_flag_survives_frame() {
        let mut quote = FlightQuote::new(5, 2, date(4), date(12), 120.5, "demo1");
        quote.direct_flight = Some(false);
        let frame = Frame::from_rows(FlightQuote::column_names(), vec![quote.to_row()]).unwrap();
        let parsed = FlightQuote::from_row(&frame, 0).unwrap();
        assert_eq!(parsed.direct_flight, Some(false));
        assert_eq!(parsed, quote);
    }
}
