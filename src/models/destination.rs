//! Destination reference model

use crate::models::Dataset;
use crate::table::{ColumnKind, ColumnSpec, Frame, Record, RowReader, Value};
use crate::validation::Schema;
use crate::Result;
use serde::{Deserialize, Serialize};

/// A travel destination, identified by its integer id
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Destination {
    pub destination_id: i64,
    /// Display name (city or island)
    pub name: String,
    pub country: String,
    /// Country code (ISO 3166-1 alpha-2)
    pub country_code: Option<String>,
    pub region: Option<String>,
    /// Latitude in decimal degrees
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees
    pub longitude: Option<f64>,
    /// IANA timezone name
    pub timezone: Option<String>,
    /// IATA code of the destination airport
    pub airport_code: Option<String>,
    pub airport_name: Option<String>,
    /// IATA code of the airport travellers depart from
    pub origin_airport: Option<String>,
}

impl Destination {
    /// Create a new destination with only the required fields set
    #[must_use]
    pub fn new(destination_id: i64, name: &str, country: &str) -> Self {
        Self {
            destination_id,
            name: name.to_string(),
            country: country.to_string(),
            country_code: None,
            region: None,
            latitude: None,
            longitude: None,
            timezone: None,
            airport_code: None,
            airport_name: None,
            origin_airport: None,
        }
    }
}

const COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::new("destination_id", ColumnKind::Integer),
    ColumnSpec::new("name", ColumnKind::Text),
    ColumnSpec::new("country", ColumnKind::Text),
    ColumnSpec::new("country_code", ColumnKind::Text),
    ColumnSpec::new("region", ColumnKind::Text),
    ColumnSpec::new("latitude", ColumnKind::Float),
    ColumnSpec::new("longitude", ColumnKind::Float),
    ColumnSpec::new("timezone", ColumnKind::Text),
    ColumnSpec::new("airport_code", ColumnKind::Text),
    ColumnSpec::new("airport_name", ColumnKind::Text),
    ColumnSpec::new("origin_airport", ColumnKind::Text),
];

impl Record for Destination {
    const DATASET: Dataset = Dataset::Destinations;
    const COLUMNS: &'static [ColumnSpec] = COLUMNS;

    fn schema() -> Schema {
        Schema::new()
            .required(["destination_id", "name", "country"])
            .numeric(["destination_id", "latitude", "longitude"])
            .critical(["destination_id", "name"])
    }

    fn from_row(frame: &Frame, row: usize) -> Result<Self> {
        let r = RowReader::new(frame, row);
        Ok(Self {
            destination_id: r.int("destination_id")?,
            name: r.text("name")?,
            country: r.opt_text("country").unwrap_or_default(),
            country_code: r.opt_text("country_code"),
            region: r.opt_text("region"),
            latitude: r.opt_float("latitude"),
            longitude: r.opt_float("longitude"),
            timezone: r.opt_text("timezone"),
            airport_code: r.opt_text("airport_code"),
            airport_name: r.opt_text("airport_name"),
            origin_airport: r.opt_text("origin_airport"),
        })
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.destination_id.into(),
            self.name.as_str().into(),
            self.country.as_str().into(),
            self.country_code.clone().into(),
            self.region.clone().into(),
            self.latitude.into(),
            self.longitude.into(),
            self.timezone.clone().into(),
            self.airport_code.clone().into(),
            self.airport_name.clone().into(),
            self.origin_airport.clone().into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_matches_declared_columns() {
        let mut dest = Destination::new(1, "Alicante", "Spain");
        dest.airport_code = Some("ALC".to_string());
        dest.origin_airport = Some("LHR".to_string());
        let row = dest.to_row();
        assert_eq!(row.len(), Destination::COLUMNS.len());
        assert_eq!(dest.value("airport_code"), Some(Value::from("ALC")));
        assert_eq!(dest.value("latitude"), Some(Value::Missing));
        assert_eq!(dest.value("unknown"), None);
    }

    #[test]
    fn test_from_row_reads_optional_fields() {
        let mut frame = Frame::new(Destination::column_names());
        let mut dest = Destination::new(3, "Rhodes", "Greece");
        dest.latitude = Some(36.434);
        dest.longitude = Some(28.217);
        frame.push_row(dest.to_row()).unwrap();

        let parsed = Destination::from_row(&frame, 0).unwrap();
        assert_eq!(parsed, dest);
    }
}
