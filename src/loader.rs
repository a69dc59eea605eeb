//! Tabular store reader
//!
//! [`DataLoader`] reads each dataset from its CSV file at most once between
//! reloads, then serves every call from memory. Source-tag and query filters
//! are applied to the cached table on every call and are never cached
//! themselves. Merged views and aggregates are memoized in a [`TtlCache`]
//! that is dropped whenever a dataset is re-read.
//!
//! The loader is not synchronized. All methods take `&mut self`; hosts that
//! share one loader across threads must wrap it in a lock.

use crate::cache::{CacheKey, CacheStats, TtlCache};
use crate::coerce::coerce_frame;
use crate::config::DashboardConfig;
use crate::filter::Filter;
use crate::merge::{aggregate, merge_all, JoinMode};
use crate::models::{CostRecord, Dataset, Destination, FlightQuote, WeatherObservation};
use crate::table::{Frame, Record, Table, Value};
use crate::validation::validate;
use crate::{DashboardError, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

const DEFAULT_CACHE_SIZE: usize = 128;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Options shared by every dataset load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Keep only rows with this source tag
    pub data_source: Option<String>,
    /// Re-read the backing file even when the dataset is cached
    pub reload: bool,
}

impl LoadOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn source(mut self, tag: &str) -> Self {
        self.data_source = Some(tag.to_string());
        self
    }

    #[must_use]
    pub fn reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }
}

/// Flight load with optional date restrictions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlightQuery {
    pub data_source: Option<String>,
    /// Keep only quotes observed on this day
    pub search_date: Option<NaiveDate>,
    /// Inclusive departure window
    pub departure_range: Option<(NaiveDate, NaiveDate)>,
    pub reload: bool,
}

impl FlightQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn source(mut self, tag: &str) -> Self {
        self.data_source = Some(tag.to_string());
        self
    }

    #[must_use]
    pub fn searched_on(mut self, date: NaiveDate) -> Self {
        self.search_date = Some(date);
        self
    }

    #[must_use]
    pub fn departing(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.departure_range = Some((start, end));
        self
    }

    #[must_use]
    pub fn reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }
}

/// Weather load with optional date and forecast restrictions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeatherQuery {
    pub data_source: Option<String>,
    /// Inclusive date window
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Keep only rows flagged as forecasts
    pub forecast_only: bool,
    pub reload: bool,
}

impl WeatherQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn source(mut self, tag: &str) -> Self {
        self.data_source = Some(tag.to_string());
        self
    }

    #[must_use]
    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some((start, end));
        self
    }

    #[must_use]
    pub fn forecast_only(mut self) -> Self {
        self.forecast_only = true;
        self
    }

    #[must_use]
    pub fn reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }
}

/// A record type the loader keeps a cached table for
pub trait Loadable: Record {
    #[doc(hidden)]
    fn slot(loader: &mut DataLoader) -> &mut Option<Table<Self>>;
}

/// Reads, validates and memoizes the four datasets
#[derive(Debug)]
pub struct DataLoader {
    root: PathBuf,
    destinations: Option<Table<Destination>>,
    costs: Option<Table<CostRecord>>,
    flights: Option<Table<FlightQuote>>,
    weather: Option<Table<WeatherObservation>>,
    reads: HashMap<Dataset, usize>,
    derived: TtlCache<String, Frame>,
}

impl Loadable for Destination {
    fn slot(loader: &mut DataLoader) -> &mut Option<Table<Self>> {
        &mut loader.destinations
    }
}

impl Loadable for CostRecord {
    fn slot(loader: &mut DataLoader) -> &mut Option<Table<Self>> {
        &mut loader.costs
    }
}

impl Loadable for FlightQuote {
    fn slot(loader: &mut DataLoader) -> &mut Option<Table<Self>> {
        &mut loader.flights
    }
}

impl Loadable for WeatherObservation {
    fn slot(loader: &mut DataLoader) -> &mut Option<Table<Self>> {
        &mut loader.weather
    }
}

impl DataLoader {
    /// Create a new loader reading from `root` with default cache settings
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self::with_cache(root, DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL)
    }

    /// Create a new loader with explicit derived-result cache settings
    pub fn with_cache<P: Into<PathBuf>>(root: P, max_size: usize, ttl: Duration) -> Self {
        Self {
            root: root.into(),
            destinations: None,
            costs: None,
            flights: None,
            weather: None,
            reads: HashMap::new(),
            derived: TtlCache::new(max_size, ttl),
        }
    }

    /// Create a new loader from the data and cache sections of `config`
    #[must_use]
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::with_cache(&config.data.dir, config.cache.max_size, config.cache.ttl())
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Backing file of `dataset`
    #[must_use]
    pub fn path_for(&self, dataset: Dataset) -> PathBuf {
        self.root.join(dataset.relative_path())
    }

    /// Number of times the backing file of `dataset` has been read
    #[must_use]
    pub fn read_count(&self, dataset: Dataset) -> usize {
        self.reads.get(&dataset).copied().unwrap_or(0)
    }

    /// Whether `dataset` is currently held in memory
    #[must_use]
    pub fn is_cached(&self, dataset: Dataset) -> bool {
        match dataset {
            Dataset::Destinations => self.destinations.is_some(),
            Dataset::Costs => self.costs.is_some(),
            Dataset::Flights => self.flights.is_some(),
            Dataset::Weather => self.weather.is_some(),
        }
    }

    /// Load a dataset, reading its file only when not cached or on reload
    #[instrument(skip(self), fields(dataset = %R::DATASET))]
    pub fn load<R: Loadable>(&mut self, options: &LoadOptions) -> Result<Table<R>> {
        if options.reload || R::slot(self).is_none() {
            let table = self.read::<R>()?;
            *R::slot(self) = Some(table);
            self.derived.clear();
        } else {
            debug!("Serving dataset from memory");
        }

        let cached = R::slot(self).as_ref();
        let table = match (&options.data_source, cached) {
            (Some(tag), Some(table)) => table.with_source(tag),
            (None, Some(table)) => table.clone(),
            (_, None) => Table::default(),
        };
        Ok(table)
    }

    /// Install an in-memory table for a dataset, replacing any cached one
    pub fn prime<R: Loadable>(&mut self, table: Table<R>) {
        debug!(dataset = %R::DATASET, rows = table.len(), "Priming dataset");
        *R::slot(self) = Some(table);
        self.derived.clear();
    }

    /// Drop every cached table and derived result
    pub fn clear_cache(&mut self) {
        self.destinations = None;
        self.costs = None;
        self.flights = None;
        self.weather = None;
        self.derived.clear();
        info!("Data cache cleared");
    }

    fn read<R: Loadable>(&mut self) -> Result<Table<R>> {
        let dataset = R::DATASET;
        let path = self.path_for(dataset);
        if !path.is_file() {
            return Err(DashboardError::not_found(dataset.name(), path));
        }

        let started = Instant::now();
        *self.reads.entry(dataset).or_default() += 1;
        let mut frame = read_csv(&path)?;
        coerce_frame(&mut frame, R::COLUMNS);
        validate(&frame, &R::schema())?;
        let table = Table::<R>::from_frame(&frame)?;

        info!(
            dataset = %dataset,
            rows = table.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Loaded dataset from file"
        );
        Ok(table)
    }

    pub fn load_destinations(&mut self, reload: bool) -> Result<Table<Destination>> {
        self.load(&LoadOptions::new().reload(reload))
    }

    pub fn load_costs(&mut self, data_source: Option<&str>, reload: bool) -> Result<Table<CostRecord>> {
        self.load(&LoadOptions {
            data_source: data_source.map(str::to_string),
            reload,
        })
    }

    /// Load flights, then apply the query's date restrictions
    pub fn load_flights(&mut self, query: &FlightQuery) -> Result<Table<FlightQuote>> {
        let table: Table<FlightQuote> = self.load(&LoadOptions {
            data_source: query.data_source.clone(),
            reload: query.reload,
        })?;

        let mut filter = Filter::new();
        if let Some(date) = query.search_date {
            filter = filter.date_range("search_date", Some(date), Some(date));
        }
        if let Some((start, end)) = query.departure_range {
            filter = filter.date_range("departure_date", Some(start), Some(end));
        }
        filter.apply(&table)
    }

    /// Load weather, then apply the query's date and forecast restrictions
    pub fn load_weather(&mut self, query: &WeatherQuery) -> Result<Table<WeatherObservation>> {
        let table: Table<WeatherObservation> = self.load(&LoadOptions {
            data_source: query.data_source.clone(),
            reload: query.reload,
        })?;

        let mut filter = Filter::new();
        if let Some((start, end)) = query.date_range {
            filter = filter.date_range("date", Some(start), Some(end));
        }
        if query.forecast_only {
            filter = filter.flag("forecast_flag", true);
        }
        filter.apply(&table)
    }

    /// Joined view of every dataset restricted to one source tag
    #[instrument(skip(self))]
    pub fn load_all(&mut self, data_source: Option<&str>, mode: JoinMode) -> Result<Frame> {
        let key = CacheKey::new("load_all")
            .opt_arg("source", data_source)
            .arg("mode", mode)
            .render();
        if let Some(hit) = self.derived.get(&key) {
            debug!("Merged view served from cache");
            return Ok(hit);
        }

        let options = LoadOptions {
            data_source: data_source.map(str::to_string),
            reload: false,
        };
        let destinations: Table<Destination> = self.load(&LoadOptions::new())?;
        let costs: Table<CostRecord> = self.load(&options)?;
        let flights: Table<FlightQuote> = self.load(&options)?;
        let weather: Table<WeatherObservation> = self.load(&options)?;

        let merged = merge_all(&destinations, &costs, &flights, &weather, mode)?;
        self.derived.set(key, merged.clone());
        Ok(merged)
    }

    /// Per-destination aggregates restricted to one source tag
    #[instrument(skip(self))]
    pub fn aggregates(&mut self, data_source: Option<&str>) -> Result<Frame> {
        let key = CacheKey::new("aggregates").opt_arg("source", data_source).render();
        if let Some(hit) = self.derived.get(&key) {
            debug!("Aggregates served from cache");
            return Ok(hit);
        }

        let options = LoadOptions {
            data_source: data_source.map(str::to_string),
            reload: false,
        };
        let destinations: Table<Destination> = self.load(&LoadOptions::new())?;
        let costs: Table<CostRecord> = self.load(&options)?;
        let flights: Table<FlightQuote> = self.load(&options)?;
        let weather: Table<WeatherObservation> = self.load(&options)?;

        let summary = aggregate(&destinations, &costs, &flights, &weather)?;
        self.derived.set(key, summary.clone());
        Ok(summary)
    }

    /// Distinct source tags per tagged dataset; datasets without a file are skipped
    pub fn available_data_sources(&mut self) -> Result<BTreeMap<Dataset, Vec<String>>> {
        let mut sources = BTreeMap::new();
        if let Some(tags) = self.source_tags::<CostRecord>()? {
            sources.insert(Dataset::Costs, tags);
        }
        if let Some(tags) = self.source_tags::<FlightQuote>()? {
            sources.insert(Dataset::Flights, tags);
        }
        if let Some(tags) = self.source_tags::<WeatherObservation>()? {
            sources.insert(Dataset::Weather, tags);
        }
        Ok(sources)
    }

    fn source_tags<R: Loadable>(&mut self) -> Result<Option<Vec<String>>> {
        match self.load::<R>(&LoadOptions::new()) {
            Ok(table) => {
                let tags: BTreeSet<String> = table
                    .iter()
                    .filter_map(|r| r.data_source().map(str::to_string))
                    .collect();
                Ok(Some(tags.into_iter().collect()))
            }
            Err(DashboardError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Statistics of the derived-result cache
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.derived.stats()
    }
}

/// Parse a CSV file with a header row into a frame of text cells
///
/// Fields are trimmed and empty fields become missing values. Rows whose
/// width differs from the header are a load error.
pub fn read_csv(path: &Path) -> Result<Frame> {
    let load_error = |e: csv::Error| DashboardError::load(path, e.to_string());
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(load_error)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(load_error)?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(DashboardError::load(path, "file has no header row"));
    }

    let mut frame = Frame::new(headers);
    for record in reader.records() {
        let record = record.map_err(load_error)?;
        let row = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    Value::Missing
                } else {
                    Value::from(field)
                }
            })
            .collect();
        frame
            .push_row(row)
            .map_err(|e| DashboardError::load(path, e.to_string()))?;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DESTINATIONS: &str = "destination_id,name,country,country_code,region,latitude,longitude,timezone,airport_code,airport_name,origin_airport
1,Alicante,Spain,ES,Europe,38.3452,-0.4810,Europe/Madrid,ALC,Alicante-Elche Airport,LHR
2,Malaga,Spain,ES,Europe,36.7213,-4.4214,Europe/Madrid,AGP,Malaga Airport,LHR
";

    const FLIGHTS: &str = "flight_id,destination_id,origin_airport,search_date,departure_date,return_date,price,currency,duration_hours,distance_km,airline,direct_flight,data_source
1,1,LHR,2025-10-04,2025-10-11,2025-10-18,89.5,EUR,2.5,1650,Ryanair,TRUE,demo1
2,1,LHR,2025-10-04,2025-10-12,2025-10-19,95.0,EUR,2.5,1650,easyJet,FALSE,demo1
3,2,LHR,2025-10-04,2025-10-11,2025-10-18,110.0,EUR,2.8,1730,Vueling,true,demo2
";

    const WEATHER: &str = "weather_id,destination_id,date,temp_high_c,temp_low_c,temp_avg_c,rainfall_mm,humidity_percent,sunshine_hours,wind_speed_kmh,conditions,uv_index,forecast_flag,data_source
1,1,2025-10-11,25,17,21,0,60,9,12,sunny,6,TRUE,demo1
2,1,2025-10-12,24,16,20,1.2,65,7,15,partly cloudy,5,FALSE,demo1
3,2,2025-10-11,26,18,22,0,55,10,10,sunny,6,True,demo1
";

    const COSTS: &str = "destination_id,data_date,currency,monthly_living_cost,rent_1br_center,monthly_food,monthly_transport,utilities,entertainment,meal_inexpensive,meal_mid_range,beer,coffee,public_transport,data_source
1,2025-09-01,EUR,1200,800,300,40,120,100,12,45,3,1.8,1.5,demo1
1,2025-10-01,EUR,1250,820,310,40,125,100,12,45,3,1.8,1.5,demo1
2,2025-10-01,EUR,1300,850,320,45,130,110,13,50,3.5,2,1.6,demo1
";

    fn write(root: &Path, dataset: Dataset, contents: &str) {
        let path = root.join(dataset.relative_path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn fixture() -> (TempDir, DataLoader) {
        let dir = TempDir::new().unwrap();
        write(dir.path(), Dataset::Destinations, DESTINATIONS);
        write(dir.path(), Dataset::Flights, FLIGHTS);
        write(dir.path(), Dataset::Weather, WEATHER);
        write(dir.path(), Dataset::Costs, COSTS);
        let loader = DataLoader::new(dir.path());
        (dir, loader)
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, day).unwrap()
    }

    #[test]
    fn test_load_is_memoized() {
        let (_dir, mut loader) = fixture();
        let first = loader.load_destinations(false).unwrap();
        let second = loader.load_destinations(false).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(loader.read_count(Dataset::Destinations), 1);
    }

    #[test]
    fn test_reload_rereads_file() {
        let (dir, mut loader) = fixture();
        loader.load_destinations(false).unwrap();
        write(
            dir.path(),
            Dataset::Destinations,
            &format!("{DESTINATIONS}3,Rhodes,Greece,GR,Europe,36.43,28.22,Europe/Athens,RHO,Diagoras,LHR\n"),
        );
        assert_eq!(loader.load_destinations(false).unwrap().len(), 2);
        assert_eq!(loader.load_destinations(true).unwrap().len(), 3);
        assert_eq!(loader.read_count(Dataset::Destinations), 2);
    }

    #[test]
    fn test_source_filter_never_rereads() {
        let (_dir, mut loader) = fixture();
        let demo1 = loader.load_flights(&FlightQuery::new().source("demo1")).unwrap();
        let demo2 = loader.load_flights(&FlightQuery::new().source("demo2")).unwrap();
        let all = loader.load_flights(&FlightQuery::new()).unwrap();
        assert_eq!(demo1.len(), 2);
        assert_eq!(demo2.len(), 1);
        assert_eq!(all.len(), 3);
        assert!(demo1.iter().all(|f| f.data_source == "demo1"));
        assert_eq!(loader.read_count(Dataset::Flights), 1);
    }

    #[test]
    fn test_mixed_boolean_literals() {
        let (_dir, mut loader) = fixture();
        let flights = loader.load_flights(&FlightQuery::new()).unwrap();
        let direct: Vec<Option<bool>> = flights.iter().map(|f| f.direct_flight).collect();
        assert_eq!(direct, vec![Some(true), Some(false), Some(true)]);

        let forecasts = loader.load_weather(&WeatherQuery::new().forecast_only()).unwrap();
        assert_eq!(forecasts.len(), 2);
    }

    #[test]
    fn test_query_date_ranges() {
        let (_dir, mut loader) = fixture();
        let flights = loader
            .load_flights(&FlightQuery::new().searched_on(date(4)).departing(date(12), date(12)))
            .unwrap();
        assert_eq!(flights.len(), 1);

        let weather = loader.load_weather(&WeatherQuery::new().between(date(11), date(11))).unwrap();
        assert_eq!(weather.len(), 2);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut loader = DataLoader::new(dir.path());
        let err = loader.load_destinations(false).unwrap_err();
        match err {
            DashboardError::NotFound { dataset, path } => {
                assert_eq!(dataset, "destinations");
                assert!(path.ends_with("destinations/destinations.csv"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(loader.read_count(Dataset::Destinations), 0);
    }

    #[test]
    fn test_ragged_file_is_load_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), Dataset::Destinations, "destination_id,name,country\n1,Alicante\n");
        let mut loader = DataLoader::new(dir.path());
        let err = loader.load_destinations(false).unwrap_err();
        assert!(matches!(err, DashboardError::Load { .. }));
    }

    #[test]
    fn test_invalid_table_fails_validation() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            Dataset::Costs,
            "destination_id,data_date,monthly_living_cost,data_source\n1,2025-10-01,-5,demo1\n",
        );
        let mut loader = DataLoader::new(dir.path());
        let err = loader.load_costs(None, false).unwrap_err();
        assert!(err.is_validation());
        assert!(!loader.is_cached(Dataset::Costs));
    }

    #[test]
    fn test_clear_cache_forces_reread() {
        let (_dir, mut loader) = fixture();
        loader.load_costs(None, false).unwrap();
        loader.clear_cache();
        assert!(!loader.is_cached(Dataset::Costs));
        loader.load_costs(None, false).unwrap();
        assert_eq!(loader.read_count(Dataset::Costs), 2);
    }

    #[test]
    fn test_derived_results_are_memoized_and_invalidated() {
        let (_dir, mut loader) = fixture();
        let first = loader.aggregates(Some("demo1")).unwrap();
        let second = loader.aggregates(Some("demo1")).unwrap();
        assert_eq!(first, second);
        assert_eq!(loader.cache_stats().hits, 1);

        loader.load_destinations(true).unwrap();
        assert_eq!(loader.cache_stats().size, 0);
    }

    #[test]
    fn test_load_all_joins_weather_on_departure() {
        let (_dir, mut loader) = fixture();
        let merged = loader.load_all(Some("demo1"), JoinMode::Left).unwrap();
        // two Alicante flights plus Malaga without demo1 flights
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.value(0, "temp_high_c"), Some(&Value::Float(25.0)));
        assert_eq!(merged.value(0, "monthly_living_cost"), Some(&Value::Float(1250.0)));
    }

    #[test]
    fn test_available_sources_skip_missing_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), Dataset::Flights, FLIGHTS);
        let mut loader = DataLoader::new(dir.path());
        let sources = loader.available_data_sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[&Dataset::Flights], vec!["demo1", "demo2"]);
    }

    #[test]
    fn test_prime_replaces_file_data() {
        let dir = TempDir::new().unwrap();
        let mut loader = DataLoader::new(dir.path());
        loader.prime(Table::new(vec![Destination::new(9, "Split", "Croatia")]));
        let table = loader.load_destinations(false).unwrap();
        assert_eq!(table.records()[0].name, "Split");
        assert_eq!(loader.read_count(Dataset::Destinations), 0);
    }
}
