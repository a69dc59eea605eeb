//! Data-quality report across the four datasets
//!
//! None of these conditions are enforced at load time. Orphaned foreign keys
//! simply produce missing values in left joins; the report exists so hosts and
//! tests can see how clean a data drop is.

use crate::models::{CostRecord, Destination, FlightQuote, WeatherObservation};
use crate::table::Table;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Counts of rows violating each data-quality rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub duplicate_destination_ids: usize,
    pub orphan_costs: usize,
    pub orphan_flights: usize,
    pub orphan_weather: usize,
    /// Weather rows where `high >= avg >= low` does not hold
    pub temperature_order: usize,
    /// Flight rows where `return > departure >= search` does not hold
    pub flight_date_order: usize,
    pub humidity_out_of_range: usize,
    pub uv_out_of_range: usize,
    pub non_positive_durations: usize,
}

impl IntegrityReport {
    /// True when no rule is violated
    #[must_use]
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }

    /// Rule names paired with their violation counts
    #[must_use]
    pub fn entries(&self) -> [(&'static str, usize); 9] {
        [
            ("duplicate destination ids", self.duplicate_destination_ids),
            ("costs without destination", self.orphan_costs),
            ("flights without destination", self.orphan_flights),
            ("weather without destination", self.orphan_weather),
            ("temperature order", self.temperature_order),
            ("flight date order", self.flight_date_order),
            ("humidity out of range", self.humidity_out_of_range),
            ("uv index out of range", self.uv_out_of_range),
            ("non-positive durations", self.non_positive_durations),
        ]
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, count) in self.entries() {
            writeln!(f, "{name:<30} {count}")?;
        }
        Ok(())
    }
}

fn outside(value: Option<f64>, low: f64, high: f64) -> bool {
    value.is_some_and(|v| v < low || v > high)
}

fn temperatures_unordered(w: &WeatherObservation) -> bool {
    match (w.temp_high_c, w.temp_avg_c, w.temp_low_c) {
        (Some(high), Some(avg), Some(low)) => !(high >= avg && avg >= low),
        _ => false,
    }
}

fn dates_unordered(f: &FlightQuote) -> bool {
    if f.departure_date < f.search_date {
        return true;
    }
    f.trip_length_days().is_some_and(|nights| nights <= 0)
}

/// Count data-quality violations; never fails
#[tracing::instrument(skip_all, fields(destinations = destinations.len()))]
#[must_use]
pub fn check_integrity(
    destinations: &Table<Destination>,
    costs: &Table<CostRecord>,
    flights: &Table<FlightQuote>,
    weather: &Table<WeatherObservation>,
) -> IntegrityReport {
    let mut ids = HashSet::new();
    let duplicate_destination_ids = destinations
        .iter()
        .filter(|d| !ids.insert(d.destination_id))
        .count();

    let report = IntegrityReport {
        duplicate_destination_ids,
        orphan_costs: costs.iter().filter(|c| !ids.contains(&c.destination_id)).count(),
        orphan_flights: flights.iter().filter(|f| !ids.contains(&f.destination_id)).count(),
        orphan_weather: weather.iter().filter(|w| !ids.contains(&w.destination_id)).count(),
        temperature_order: weather.iter().filter(|w| temperatures_unordered(w)).count(),
        flight_date_order: flights.iter().filter(|f| dates_unordered(f)).count(),
        humidity_out_of_range: weather
            .iter()
            .filter(|w| outside(w.humidity_percent, 0.0, 100.0))
            .count(),
        uv_out_of_range: weather.iter().filter(|w| outside(w.uv_index, 0.0, 15.0)).count(),
        non_positive_durations: flights
            .iter()
            .filter(|f| f.duration_hours.is_some_and(|h| h <= 0.0))
            .count(),
    };
    if !report.is_clean() {
        tracing::warn!(?report, "Data integrity issues found");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, day).unwrap()
    }

    #[test]
    fn test_clean_data() {
        let destinations = Table::new(vec![Destination::new(1, "Alicante", "Spain")]);
        let mut flight = FlightQuote::new(1, 1, date(4), date(11), 89.0, "demo1");
        flight.return_date = Some(date(18));
        flight.duration_hours = Some(2.5);
        let report = check_integrity(
            &destinations,
            &Table::new(vec![CostRecord::new(1, date(1), 1100.0, "demo1")]),
            &Table::new(vec![flight]),
            &Table::new(vec![WeatherObservation::new(1, 1, date(11), 16.0, 24.0, "demo1")]),
        );
        assert!(report.is_clean());
    }

    #[test]
    fn test_violations_are_counted() {
        let destinations = Table::new(vec![
            Destination::new(1, "Alicante", "Spain"),
            Destination::new(1, "Alicante", "Spain"),
        ]);
        let mut bad_dates = FlightQuote::new(1, 9, date(12), date(11), 89.0, "demo1");
        bad_dates.duration_hours = Some(0.0);
        let mut hot_avg = WeatherObservation::new(1, 1, date(11), 16.0, 24.0, "demo1");
        hot_avg.temp_avg_c = Some(30.0);
        hot_avg.humidity_percent = Some(120.0);
        hot_avg.uv_index = Some(16.0);

        let report = check_integrity(
            &destinations,
            &Table::default(),
            &Table::new(vec![bad_dates]),
            &Table::new(vec![hot_avg]),
        );
        assert_eq!(report.duplicate_destination_ids, 1);
        assert_eq!(report.orphan_flights, 1);
        assert_eq!(report.orphan_weather, 0);
        assert_eq!(report.flight_date_order, 1);
        assert_eq!(report.non_positive_durations, 1);
        assert_eq!(report.temperature_order, 1);
        assert_eq!(report.humidity_out_of_range, 1);
        assert_eq!(report.uv_out_of_range, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_return_on_departure_day_is_a_violation() {
        let mut flight = FlightQuote::new(1, 1, date(4), date(11), 89.0, "demo1");
        flight.return_date = Some(date(11));
        assert!(dates_unordered(&flight));
    }
}
