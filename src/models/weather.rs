//! Weather forecast and observation model

use crate::models::Dataset;
use crate::table::{ColumnKind, ColumnSpec, Frame, Record, RowReader, Value};
use crate::validation::Schema;
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Weather for one destination on one date
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherObservation {
    pub weather_id: i64,
    pub destination_id: i64,
    pub date: NaiveDate,
    /// Daily high temperature in Celsius
    pub temp_high_c: Option<f64>,
    /// Daily low temperature in Celsius
    pub temp_low_c: Option<f64>,
    pub temp_avg_c: Option<f64>,
    pub rainfall_mm: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub sunshine_hours: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    /// Condition label such as "sunny" or "partly cloudy"
    pub conditions: Option<String>,
    pub uv_index: Option<f64>,
    /// True for forecasts, false for observed values
    pub forecast_flag: Option<bool>,
    pub data_source: String,
}

impl WeatherObservation {
    /// Create a new observation with a temperature band
    #[must_use]
    pub fn new(weather_id: i64, destination_id: i64, date: NaiveDate, low: f64, high: f64, data_source: &str) -> Self {
        Self {
            weather_id,
            destination_id,
            date,
            temp_high_c: Some(high),
            temp_low_c: Some(low),
            temp_avg_c: Some((low + high) / 2.0),
            rainfall_mm: None,
            humidity_percent: None,
            sunshine_hours: None,
            wind_speed_kmh: None,
            conditions: None,
            uv_index: None,
            forecast_flag: Some(true),
            data_source: data_source.to_string(),
        }
    }

    #[must_use]
    pub fn is_forecast(&self) -> bool {
        self.forecast_flag.unwrap_or(false)
    }
}

const COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::new("weather_id", ColumnKind::Integer),
    ColumnSpec::new("destination_id", ColumnKind::Integer),
    ColumnSpec::new("date", ColumnKind::Date),
    ColumnSpec::new("temp_high_c", ColumnKind::Float),
    ColumnSpec::new("temp_low_c", ColumnKind::Float),
    ColumnSpec::new("temp_avg_c", ColumnKind::Float),
    ColumnSpec::new("rainfall_mm", ColumnKind::Float),
    ColumnSpec::new("humidity_percent", ColumnKind::Float),
    ColumnSpec::new("sunshine_hours", ColumnKind::Float),
    ColumnSpec::new("wind_speed_kmh", ColumnKind::Float),
    ColumnSpec::new("conditions", ColumnKind::Text),
    ColumnSpec::new("uv_index", ColumnKind::Float),
    ColumnSpec::new("forecast_flag", ColumnKind::Bool),
    ColumnSpec::new("data_source", ColumnKind::Text),
];

impl Record for WeatherObservation {
    const DATASET: Dataset = Dataset::Weather;
    const COLUMNS: &'static [ColumnSpec] = COLUMNS;

    fn schema() -> Schema {
        Schema::new()
            .required(["weather_id", "destination_id", "date", "data_source"])
            .numeric([
                "weather_id",
                "destination_id",
                "temp_high_c",
                "temp_low_c",
                "temp_avg_c",
                "rainfall_mm",
                "humidity_percent",
                "sunshine_hours",
                "wind_speed_kmh",
                "uv_index",
            ])
            .critical(["weather_id", "destination_id", "date", "data_source"])
    }

    fn from_row(frame: &Frame, row: usize) -> Result<Self> {
        let r = RowReader::new(frame, row);
        Ok(Self {
            weather_id: r.int("weather_id")?,
            destination_id: r.int("destination_id")?,
            date: r.date("date")?,
            temp_high_c: r.opt_float("temp_high_c"),
            temp_low_c: r.opt_float("temp_low_c"),
            temp_avg_c: r.opt_float("temp_avg_c"),
            rainfall_mm: r.opt_float("rainfall_mm"),
            humidity_percent: r.opt_float("humidity_percent"),
            sunshine_hours: r.opt_float("sunshine_hours"),
            wind_speed_kmh: r.opt_float("wind_speed_kmh"),
            conditions: r.opt_text("conditions"),
            uv_index: r.opt_float("uv_index"),
            forecast_flag: r.opt_bool("forecast_flag"),
            data_source: r.text("data_source")?,
        })
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.weather_id.into(),
            self.destination_id.into(),
            self.date.into(),
            self.temp_high_c.into(),
            self.temp_low_c.into(),
            self.temp_avg_c.into(),
            self.rainfall_mm.into(),
            self.humidity_percent.into(),
            self.sunshine_hours.into(),
            self.wind_speed_kmh.into(),
            self.conditions.clone().into(),
            self.uv_index.into(),
            self.forecast_flag.into(),
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

    #[test]
    fn test_new_observation_has_ordered_temperatures() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 11).unwrap();
        let obs = WeatherObservation::new(1, 1, date, 17.0, 25.0, "demo1");
        assert_eq!(obs.temp_avg_c, Some(21.0));
        assert!(obs.is_forecast());
    }

    #[test]
    fn test_unknown_flag_is_not_a_forecast() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 11).unwrap();
        let mut obs = WeatherObservation::new(1, 1, date, 17.0, 25.0, "demo1");
        obs.forecast_flag = None;
        assert!(!obs.is_forecast());
        assert_eq!(obs.value("forecast_flag"), Some(Value::Missing));
    }
}
