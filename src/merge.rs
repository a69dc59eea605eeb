//! Joins and per-destination aggregates
//!
//! All operations produce new [`Frame`]s; inputs are never modified. Column
//! sets of merged results depend on which datasets are non-empty, which is
//! why they are frames rather than typed tables.

use crate::models::{CostRecord, Destination, FlightQuote, WeatherObservation};
use crate::table::{Frame, Table, Value};
use crate::{DashboardError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

/// Retention policy for unmatched rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Keep every left row; unmatched right columns are missing
    #[default]
    Left,
    /// Keep only left rows with at least one match
    Inner,
    /// Keep every row from both sides
    Outer,
}

impl JoinMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JoinMode::Left => "left",
            JoinMode::Inner => "inner",
            JoinMode::Outer => "outer",
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinMode {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(JoinMode::Left),
            "inner" => Ok(JoinMode::Inner),
            "outer" => Ok(JoinMode::Outer),
            other => Err(DashboardError::validation(format!(
                "unknown join mode '{other}', expected left, inner or outer"
            ))),
        }
    }
}

/// Hashable form of a join key cell; integral floats compare equal to integers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Int(i64),
    Float(u64),
    Bool(bool),
    Date(NaiveDate),
    Text(String),
}

fn key_part(value: &Value) -> Option<KeyPart> {
    match value {
        Value::Missing => None,
        Value::Int(v) => Some(KeyPart::Int(*v)),
        Value::Float(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Some(KeyPart::Int(*v as i64)),
        Value::Float(v) => Some(KeyPart::Float(v.to_bits())),
        Value::Bool(v) => Some(KeyPart::Bool(*v)),
        Value::Date(d) => Some(KeyPart::Date(*d)),
        Value::Text(s) => Some(KeyPart::Text(s.clone())),
    }
}

/// Key of one row; `None` when any key cell is missing, so it never matches
fn row_key(row: &[Value], indices: &[usize]) -> Option<Vec<KeyPart>> {
    indices.iter().map(|&i| key_part(&row[i])).collect()
}

fn key_indices(frame: &Frame, on: &[&str]) -> Result<Vec<usize>> {
    let missing: Vec<&str> = on.iter().copied().filter(|c| !frame.has_column(c)).collect();
    if !missing.is_empty() {
        return Err(DashboardError::missing_columns(
            missing,
            frame.columns().iter().map(String::as_str),
        ));
    }
    Ok(on.iter().filter_map(|c| frame.column_index(c)).collect())
}

/// Join two frames on the columns named in `on`
///
/// Left rows keep their order and fan out once per matching right row, in
/// right-row order. Non-key right columns whose name already exists on the
/// left get `suffix` appended. In outer mode unmatched right rows are
/// appended after all left rows, with key columns taken from the right side.
pub fn join(left: &Frame, right: &Frame, on: &[&str], mode: JoinMode, suffix: &str) -> Result<Frame> {
    let left_keys = key_indices(left, on)?;
    let right_keys = key_indices(right, on)?;

    let carried: Vec<usize> = (0..right.columns().len())
        .filter(|i| !right_keys.contains(i))
        .collect();
    let mut columns: Vec<String> = left.columns().to_vec();
    for &i in &carried {
        let name = &right.columns()[i];
        if left.has_column(name) {
            columns.push(format!("{name}{suffix}"));
        } else {
            columns.push(name.clone());
        }
    }

    let mut index: HashMap<Vec<KeyPart>, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows().iter().enumerate() {
        if let Some(key) = row_key(row, &right_keys) {
            index.entry(key).or_default().push(i);
        }
    }

    let mut out = Frame::new(columns);
    let mut matched = vec![false; right.len()];
    for row in left.rows() {
        let hits = row_key(row, &left_keys).and_then(|key| index.get(&key));
        match hits {
            Some(hits) => {
                for &r in hits {
                    matched[r] = true;
                    let mut joined = row.clone();
                    joined.extend(carried.iter().map(|&c| right.rows()[r][c].clone()));
                    out.push_row(joined)?;
                }
            }
            None if mode == JoinMode::Inner => {}
            None => {
                let mut joined = row.clone();
                joined.extend(std::iter::repeat_n(Value::Missing, carried.len()));
                out.push_row(joined)?;
            }
        }
    }

    if mode == JoinMode::Outer {
        for (r, row) in right.rows().iter().enumerate() {
            if matched[r] {
                continue;
            }
            let mut joined = vec![Value::Missing; left.columns().len()];
            for (&l, &k) in left_keys.iter().zip(&right_keys) {
                joined[l] = row[k].clone();
            }
            joined.extend(carried.iter().map(|&c| row[c].clone()));
            out.push_row(joined)?;
        }
    }

    debug!(left = left.len(), right = right.len(), rows = out.len(), %mode, "Joined frames");
    Ok(out)
}

/// Collapse costs to one row per destination
///
/// Rows are visited in date order and every field keeps its latest non-missing
/// value, so a newer snapshot with gaps does not blank out older figures. On
/// equal dates the later row wins. Output is ordered by destination id.
#[must_use]
pub fn latest_costs(costs: &Table<CostRecord>) -> Table<CostRecord> {
    let mut by_date: Vec<&CostRecord> = costs.iter().collect();
    by_date.sort_by_key(|c| c.data_date);

    let mut latest: BTreeMap<i64, CostRecord> = BTreeMap::new();
    for cost in by_date {
        match latest.get_mut(&cost.destination_id) {
            Some(current) => overlay(current, cost),
            None => {
                latest.insert(cost.destination_id, cost.clone());
            }
        }
    }
    Table::new(latest.into_values().collect())
}

fn keep_present<T: Clone>(slot: &mut Option<T>, newer: &Option<T>) {
    if newer.is_some() {
        slot.clone_from(newer);
    }
}

fn overlay(current: &mut CostRecord, newer: &CostRecord) {
    current.data_date = newer.data_date;
    current.data_source.clone_from(&newer.data_source);
    keep_present(&mut current.currency, &newer.currency);
    keep_present(&mut current.monthly_living_cost, &newer.monthly_living_cost);
    keep_present(&mut current.rent_1br_center, &newer.rent_1br_center);
    keep_present(&mut current.monthly_food, &newer.monthly_food);
    keep_present(&mut current.monthly_transport, &newer.monthly_transport);
    keep_present(&mut current.utilities, &newer.utilities);
    keep_present(&mut current.entertainment, &newer.entertainment);
    keep_present(&mut current.meal_inexpensive, &newer.meal_inexpensive);
    keep_present(&mut current.meal_mid_range, &newer.meal_mid_range);
    keep_present(&mut current.beer, &newer.beer);
    keep_present(&mut current.coffee, &newer.coffee);
    keep_present(&mut current.public_transport, &newer.public_transport);
}

/// Destination-centric joined view of all four datasets
///
/// Costs are collapsed to the latest snapshot and always joined. Flights are
/// joined when present and fan out one row per quote. Weather is joined when
/// present: on `(destination_id, departure_date)` if flights contributed a
/// departure date, otherwise on `destination_id` alone.
#[instrument(skip_all, fields(mode = %mode))]
pub fn merge_all(
    destinations: &Table<Destination>,
    costs: &Table<CostRecord>,
    flights: &Table<FlightQuote>,
    weather: &Table<WeatherObservation>,
    mode: JoinMode,
) -> Result<Frame> {
    let mut merged = join(
        &destinations.to_frame(),
        &latest_costs(costs).to_frame(),
        &["destination_id"],
        mode,
        "_cost",
    )?;

    if !flights.is_empty() {
        merged = join(&merged, &flights.to_frame(), &["destination_id"], mode, "_flight")?;
    }

    if !weather.is_empty() {
        let mut weather_frame = weather.to_frame();
        if merged.has_column("departure_date") {
            weather_frame.rename_column("date", "departure_date");
            merged = join(
                &merged,
                &weather_frame,
                &["destination_id", "departure_date"],
                mode,
                "_weather",
            )?;
        } else {
            merged = join(&merged, &weather_frame, &["destination_id"], mode, "_weather")?;
        }
    }

    debug!(rows = merged.len(), columns = merged.columns().len(), "Merged datasets");
    Ok(merged)
}

/// Running statistics over optional values
#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    sum: f64,
    count: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl Stats {
    fn push(&mut self, value: Option<f64>) {
        let Some(v) = value else { return };
        self.sum += v;
        self.count += 1;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    fn total(&self) -> Option<f64> {
        (self.count > 0).then_some(self.sum)
    }
}

fn rounded(value: Option<f64>) -> Value {
    value.map(|v| (v * 100.0).round() / 100.0).into()
}

#[derive(Default)]
struct FlightStats {
    price: Stats,
}

#[derive(Default)]
struct WeatherStats {
    avg: Stats,
    high: Stats,
    low: Stats,
    rainfall: Stats,
    uv: Stats,
    sunshine: Stats,
}

const COST_AGGREGATES: &[&str] = &["monthly_living_cost"];
const FLIGHT_AGGREGATES: &[&str] = &[
    "avg_flight_price",
    "min_flight_price",
    "max_flight_price",
    "flight_count",
];
const WEATHER_AGGREGATES: &[&str] = &[
    "avg_temp",
    "max_temp",
    "min_temp",
    "total_rainfall",
    "avg_uv_index",
    "total_sunshine_hours",
];

/// Per-destination summary statistics, one row per destination
///
/// A dataset that is empty contributes no columns at all. A destination with
/// no rows in a non-empty dataset gets missing values for that section.
#[instrument(skip_all, fields(destinations = destinations.len()))]
pub fn aggregate(
    destinations: &Table<Destination>,
    costs: &Table<CostRecord>,
    flights: &Table<FlightQuote>,
    weather: &Table<WeatherObservation>,
) -> Result<Frame> {
    let mut columns = vec!["destination_id", "name", "country"];
    if !costs.is_empty() {
        columns.extend_from_slice(COST_AGGREGATES);
    }
    if !flights.is_empty() {
        columns.extend_from_slice(FLIGHT_AGGREGATES);
    }
    if !weather.is_empty() {
        columns.extend_from_slice(WEATHER_AGGREGATES);
    }

    let latest: HashMap<i64, Option<f64>> = latest_costs(costs)
        .iter()
        .map(|c| (c.destination_id, c.monthly_living_cost))
        .collect();

    let mut flight_stats: HashMap<i64, FlightStats> = HashMap::new();
    for quote in flights {
        flight_stats.entry(quote.destination_id).or_default().price.push(quote.price);
    }

    let mut weather_stats: HashMap<i64, WeatherStats> = HashMap::new();
    for obs in weather {
        let stats = weather_stats.entry(obs.destination_id).or_default();
        stats.avg.push(obs.temp_avg_c);
        stats.high.push(obs.temp_high_c);
        stats.low.push(obs.temp_low_c);
        stats.rainfall.push(obs.rainfall_mm);
        stats.uv.push(obs.uv_index);
        stats.sunshine.push(obs.sunshine_hours);
    }

    let mut out = Frame::new(columns);
    for dest in destinations {
        let id = dest.destination_id;
        let mut row: Vec<Value> = vec![id.into(), dest.name.as_str().into(), dest.country.as_str().into()];

        if !costs.is_empty() {
            row.push(rounded(latest.get(&id).copied().flatten()));
        }
        if !flights.is_empty() {
            match flight_stats.get(&id) {
                Some(s) => row.extend([
                    rounded(s.price.mean()),
                    rounded(s.price.min),
                    rounded(s.price.max),
                    Value::from(i64::try_from(s.price.count).unwrap_or(i64::MAX)),
                ]),
                None => row.extend(std::iter::repeat_n(Value::Missing, FLIGHT_AGGREGATES.len())),
            }
        }
        if !weather.is_empty() {
            match weather_stats.get(&id) {
                Some(s) => row.extend([
                    rounded(s.avg.mean()),
                    rounded(s.high.max),
                    rounded(s.low.min),
                    rounded(s.rainfall.total()),
                    rounded(s.uv.mean()),
                    rounded(s.sunshine.total()),
                ]),
                None => row.extend(std::iter::repeat_n(Value::Missing, WEATHER_AGGREGATES.len())),
            }
        }
        out.push_row(row)?;
    }

    debug!(rows = out.len(), "Computed aggregates");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Record;
    use rstest::rstest;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, day).unwrap()
    }

    fn destinations() -> Table<Destination> {
        Table::new(vec![
            Destination::new(1, "Alicante", "Spain"),
            Destination::new(2, "Malaga", "Spain"),
        ])
    }

    fn costs() -> Table<CostRecord> {
        Table::new(vec![
            CostRecord::new(1, date(1), 1000.0, "demo1"),
            CostRecord::new(1, date(3), 1100.0, "demo1"),
            CostRecord::new(2, date(2), 1300.0, "demo1"),
        ])
    }

    fn flights() -> Table<FlightQuote> {
        Table::new(vec![
            FlightQuote::new(1, 1, date(4), date(11), 80.0, "demo1"),
            FlightQuote::new(2, 1, date(4), date(12), 100.0, "demo1"),
            FlightQuote::new(3, 1, date(4), date(13), 120.0, "demo1"),
        ])
    }

    fn weather() -> Table<WeatherObservation> {
        Table::new(vec![
            WeatherObservation::new(1, 1, date(11), 16.0, 24.0, "demo1"),
            WeatherObservation::new(2, 1, date(12), 15.0, 23.0, "demo1"),
            WeatherObservation::new(3, 2, date(11), 14.0, 22.0, "demo1"),
        ])
    }

    #[test]
    fn test_latest_costs_keeps_max_date() {
        let latest = latest_costs(&costs());
        assert_eq!(latest.len(), 2);
        assert_eq!(latest.records()[0].monthly_living_cost, Some(1100.0));
        assert_eq!(latest.records()[1].destination_id, 2);
    }

    #[test]
    fn test_latest_costs_keep_last_present_value() {
        let mut newer = CostRecord::new(1, date(5), 0.0, "demo2");
        newer.monthly_living_cost = None;
        newer.rent_1br_center = Some(700.0);
        // newest row comes first in file order
        let costs = Table::new(vec![newer, CostRecord::new(1, date(1), 1000.0, "demo1")]);

        let latest = latest_costs(&costs);
        assert_eq!(latest.len(), 1);
        let cost = &latest.records()[0];
        assert_eq!(cost.data_date, date(5));
        assert_eq!(cost.monthly_living_cost, Some(1000.0));
        assert_eq!(cost.rent_1br_center, Some(700.0));
        assert_eq!(cost.data_source, "demo2");
    }

    #[test]
    fn test_fan_out_uses_latest_cost_only() {
        let merged = merge_all(&destinations(), &costs(), &flights(), &Table::default(), JoinMode::Left).unwrap();
        let alicante = merged
            .column("destination_id")
            .unwrap()
            .filter(|v| **v == Value::Int(1))
            .count();
        assert_eq!(alicante, 3);
        // Malaga has no flights but is kept in left mode
        assert_eq!(merged.len(), 4);
        assert_eq!(merged.value(0, "monthly_living_cost"), Some(&Value::Float(1100.0)));
    }

    #[rstest]
    #[case(JoinMode::Left, 4)]
    #[case(JoinMode::Inner, 3)]
    fn test_join_modes_on_flights(#[case] mode: JoinMode, #[case] expected: usize) {
        let merged = merge_all(&destinations(), &costs(), &flights(), &Table::default(), mode).unwrap();
        assert_eq!(merged.len(), expected);
    }

    /// Cost and flight rows whose destination is unknown
    fn orphans() -> (Table<CostRecord>, Table<FlightQuote>) {
        let mut costs = costs().into_records();
        costs.push(CostRecord::new(9, date(2), 1500.0, "demo1"));
        let mut flights = flights().into_records();
        flights.push(FlightQuote::new(4, 8, date(4), date(11), 60.0, "demo1"));
        (Table::new(costs), Table::new(flights))
    }

    #[rstest]
    #[case(JoinMode::Left, 4)]
    #[case(JoinMode::Inner, 3)]
    #[case(JoinMode::Outer, 6)]
    fn test_join_modes_with_unknown_destinations(#[case] mode: JoinMode, #[case] expected: usize) {
        let (costs, flights) = orphans();
        let merged = merge_all(&destinations(), &costs, &flights, &Table::default(), mode).unwrap();
        assert_eq!(merged.len(), expected);

        let ids: Vec<Option<i64>> = merged.column("destination_id").unwrap().map(Value::as_i64).collect();
        assert_eq!(ids.contains(&Some(9)), mode == JoinMode::Outer);
        assert_eq!(ids.contains(&Some(8)), mode == JoinMode::Outer);
    }

    #[test]
    fn test_outer_merge_keeps_orphans_without_destination() {
        let (costs, flights) = orphans();
        let merged = merge_all(&destinations(), &costs, &flights, &Table::default(), JoinMode::Outer).unwrap();

        // orphan cost row, carried through the flight join without a quote
        assert_eq!(merged.value(4, "destination_id"), Some(&Value::Int(9)));
        assert_eq!(merged.value(4, "name"), Some(&Value::Missing));
        assert_eq!(merged.value(4, "monthly_living_cost"), Some(&Value::Float(1500.0)));
        assert_eq!(merged.value(4, "price"), Some(&Value::Missing));

        // orphan flight, appended after every left row
        assert_eq!(merged.value(5, "destination_id"), Some(&Value::Int(8)));
        assert_eq!(merged.value(5, "name"), Some(&Value::Missing));
        assert_eq!(merged.value(5, "country"), Some(&Value::Missing));
        assert_eq!(merged.value(5, "monthly_living_cost"), Some(&Value::Missing));
        assert_eq!(merged.value(5, "price"), Some(&Value::Float(60.0)));
    }

    #[test]
    fn test_weather_joins_on_departure_date() {
        let merged = merge_all(&destinations(), &costs(), &flights(), &weather(), JoinMode::Left).unwrap();
        assert!(!merged.has_column("date"));
        assert_eq!(merged.value(0, "temp_high_c"), Some(&Value::Float(24.0)));
        assert_eq!(merged.value(1, "temp_high_c"), Some(&Value::Float(23.0)));
        // no weather for the 13th
        assert_eq!(merged.value(2, "temp_high_c"), Some(&Value::Missing));
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn test_weather_without_flights_fans_out_by_destination() {
        let merged = merge_all(&destinations(), &costs(), &Table::default(), &weather(), JoinMode::Left).unwrap();
        assert!(merged.has_column("date"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_overlapping_columns_get_suffix() {
        let merged = merge_all(&destinations(), &costs(), &flights(), &Table::default(), JoinMode::Left).unwrap();
        assert!(merged.has_column("data_source"));
        assert!(merged.has_column("data_source_flight"));
        assert!(merged.has_column("currency_flight"));
        assert!(merged.has_column("origin_airport_flight"));
    }

    #[test]
    fn test_outer_join_keeps_unmatched_right_rows() {
        let left = Frame::from_rows(["id", "a"], vec![vec![Value::Int(1), "x".into()]]).unwrap();
        let right = Frame::from_rows(
            ["id", "b"],
            vec![vec![Value::Int(1), "y".into()], vec![Value::Int(7), "z".into()]],
        )
        .unwrap();
        let joined = join(&left, &right, &["id"], JoinMode::Outer, "_r").unwrap();
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.value(1, "id"), Some(&Value::Int(7)));
        assert_eq!(joined.value(1, "a"), Some(&Value::Missing));
        assert_eq!(joined.value(1, "b"), Some(&Value::from("z")));
    }

    #[test]
    fn test_missing_keys_never_match() {
        let left = Frame::from_rows(["id"], vec![vec![Value::Missing]]).unwrap();
        let right = Frame::from_rows(["id", "b"], vec![vec![Value::Missing, "y".into()]]).unwrap();
        let joined = join(&left, &right, &["id"], JoinMode::Inner, "_r").unwrap();
        assert!(joined.is_empty());
    }

    #[test]
    fn test_join_requires_key_columns() {
        let left = Frame::new(["id"]);
        let right = Frame::new(["other"]);
        assert!(join(&left, &right, &["id"], JoinMode::Left, "_r").is_err());
    }

    #[test]
    fn test_aggregate_values() {
        let agg = aggregate(&destinations(), &costs(), &flights(), &weather()).unwrap();
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.value(0, "avg_flight_price"), Some(&Value::Float(100.0)));
        assert_eq!(agg.value(0, "min_flight_price"), Some(&Value::Float(80.0)));
        assert_eq!(agg.value(0, "max_flight_price"), Some(&Value::Float(120.0)));
        assert_eq!(agg.value(0, "flight_count"), Some(&Value::Int(3)));
        assert_eq!(agg.value(0, "max_temp"), Some(&Value::Float(24.0)));
        assert_eq!(agg.value(0, "min_temp"), Some(&Value::Float(15.0)));
        assert_eq!(agg.value(0, "avg_temp"), Some(&Value::Float(19.5)));
        assert_eq!(agg.value(1, "flight_count"), Some(&Value::Missing));
        assert_eq!(agg.value(1, "monthly_living_cost"), Some(&Value::Float(1300.0)));
    }

    #[test]
    fn test_aggregate_omits_empty_sections() {
        let agg = aggregate(&destinations(), &costs(), &Table::default(), &weather()).unwrap();
        assert_eq!(agg.len(), 2);
        assert!(agg.has_column("monthly_living_cost"));
        assert!(agg.has_column("avg_temp"));
        for column in FLIGHT_AGGREGATES {
            assert!(!agg.has_column(column));
        }
    }

    #[test]
    fn test_join_mode_parsing() {
        assert_eq!("Inner".parse::<JoinMode>().unwrap(), JoinMode::Inner);
        assert!("cross".parse::<JoinMode>().is_err());
        assert_eq!(JoinMode::default().to_string(), "left");
    }

    #[test]
    fn test_merged_frame_keeps_destination_columns() {
        let merged = merge_all(&destinations(), &costs(), &flights(), &weather(), JoinMode::Left).unwrap();
        for column in Destination::column_names() {
            assert!(merged.has_column(column), "{column} missing");
        }
    }
}
