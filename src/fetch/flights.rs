//! Flight price provider client

use super::client::{ApiClient, Credentials};
use crate::cache::{CacheKey, FileCache};
use crate::config::DashboardConfig;
use crate::filter::Filter;
use crate::loader::{DataLoader, FlightQuery};
use crate::models::FlightQuote;
use crate::table::Table;
use crate::{DashboardError, Result};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Supported flight search providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlightProvider {
    #[default]
    Skyscanner,
    Amadeus,
}

impl fmt::Display for FlightProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightProvider::Skyscanner => f.write_str("skyscanner"),
            FlightProvider::Amadeus => f.write_str("amadeus"),
        }
    }
}

impl FromStr for FlightProvider {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skyscanner" => Ok(FlightProvider::Skyscanner),
            "amadeus" => Ok(FlightProvider::Amadeus),
            other => Err(DashboardError::config(format!("Unknown flight provider '{other}'"))),
        }
    }
}

/// A round-trip price search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightSearch {
    /// Origin airport code
    pub origin: String,
    /// Destination airport codes; empty means every destination
    pub destinations: Vec<String>,
    pub departure_date: NaiveDate,
    pub return_date: NaiveDate,
}

impl FlightSearch {
    fn cache_key(&self) -> CacheKey {
        CacheKey::new("flight_prices")
            .arg("origin", &self.origin)
            .set_arg("to", &self.destinations)
            .arg("depart", self.departure_date)
            .arg("return", self.return_date)
    }
}

/// Flight prices from a provider, falling back to local files
#[derive(Debug)]
pub struct FlightFetcher {
    client: ApiClient,
    provider: FlightProvider,
}

impl FlightFetcher {
    /// Create a new fetcher without a response cache
    #[must_use]
    pub fn new(credentials: Credentials, provider: FlightProvider, fallback_source: &str) -> Self {
        Self {
            client: ApiClient::new("flights", credentials, 50, fallback_source),
            provider,
        }
    }

    /// Create a new fetcher from the fetch and cache sections of `config`
    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        let fetch = &config.fetch;
        let credentials = Credentials {
            api_key: Credentials::with_key(fetch.flight_api_key.clone()).api_key,
            base_url: fetch.flight_base_url.clone(),
        };
        let cache = FileCache::new(
            Path::new(&config.cache.location).join("flights"),
            Duration::from_secs(fetch.flight_cache_ttl_seconds),
        )?;
        let client = ApiClient::new("flights", credentials, fetch.rate_limit_per_minute, &fetch.fallback_source)
            .with_cache(cache);
        Ok(Self {
            client,
            provider: fetch.flight_provider.parse()?,
        })
    }

    #[must_use]
    pub fn provider(&self) -> FlightProvider {
        self.provider
    }

    /// Prices for a search, served from the response cache when fresh
    #[instrument(skip(self, loader), fields(origin = %search.origin))]
    pub fn fetch_prices(&mut self, loader: &mut DataLoader, search: &FlightSearch) -> Result<Table<FlightQuote>> {
        let key = search.cache_key();
        if let Some(hit) = self.client.cached(&key) {
            return Ok(hit);
        }
        let quotes = self.request(loader, search)?;
        self.client.store(&key, &quotes);
        Ok(quotes)
    }

    fn request(&mut self, loader: &mut DataLoader, search: &FlightSearch) -> Result<Table<FlightQuote>> {
        let credentials = self.client.credentials();
        if !credentials.has_key() || credentials.base_url.is_none() {
            warn!("API credentials not configured, using CSV fallback");
            return self.fallback(loader, &search.origin, &search.destinations);
        }

        self.client.throttle();
        info!(
            provider = %self.provider,
            destinations = ?search.destinations,
            "Fetching flight prices"
        );
        info!(provider = %self.provider, "Provider integration is a stub, using CSV fallback");
        self.fallback(loader, &search.origin, &search.destinations)
    }

    /// Flights of the fallback source tag departing from `origin`
    ///
    /// When `destinations` is non-empty, only destinations whose airport code
    /// is listed are kept; codes that match no destination yield no rows.
    pub fn fallback(&self, loader: &mut DataLoader, origin: &str, destinations: &[String]) -> Result<Table<FlightQuote>> {
        info!(source = self.client.fallback_source(), "Using CSV fallback for flight data");
        let flights = loader.load_flights(&FlightQuery::new().source(self.client.fallback_source()))?;
        let flights = Filter::new().one_of("origin_airport", [origin]).apply(&flights)?;
        if destinations.is_empty() {
            return Ok(flights);
        }

        let ids: Vec<i64> = loader
            .load_destinations(false)?
            .iter()
            .filter(|d| d.airport_code.as_ref().is_some_and(|code| destinations.contains(code)))
            .map(|d| d.destination_id)
            .collect();
        if ids.is_empty() {
            return Ok(Table::default());
        }
        Filter::new().one_of("destination_id", ids).apply(&flights)
    }

    /// Cheapest quotes per destination, at most `limit` each
    ///
    /// With explicit travel dates the provider path is used, otherwise the
    /// fallback data is searched directly.
    pub fn cheapest_flights(
        &mut self,
        loader: &mut DataLoader,
        origin: &str,
        destinations: &[String],
        dates: Option<(NaiveDate, NaiveDate)>,
        limit: usize,
    ) -> Result<Table<FlightQuote>> {
        let quotes = match dates {
            Some((departure_date, return_date)) => self.fetch_prices(
                loader,
                &FlightSearch {
                    origin: origin.to_string(),
                    destinations: destinations.to_vec(),
                    departure_date,
                    return_date,
                },
            )?,
            None => self.fallback(loader, origin, destinations)?,
        };
        Ok(cheapest_per_destination(quotes, limit))
    }
}

fn by_price(a: &FlightQuote, b: &FlightQuote) -> Ordering {
    match (a.price, b.price) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort by price ascending and keep the first `limit` quotes per destination
fn cheapest_per_destination(quotes: Table<FlightQuote>, limit: usize) -> Table<FlightQuote> {
    let mut records = quotes.into_records();
    records.sort_by(by_price);
    let mut seen: HashMap<i64, usize> = HashMap::new();
    records.retain(|q| {
        let count = seen.entry(q.destination_id).or_default();
        *count += 1;
        *count <= limit
    });
    Table::new(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, day).unwrap()
    }

    fn quote(id: i64, dest: i64, price: Option<f64>) -> FlightQuote {
        let mut q = FlightQuote::new(id, dest, date(4), date(11), 0.0, "demo1");
        q.price = price;
        q
    }

    #[test]
    fn test_cheapest_per_destination() {
        let quotes = Table::new(vec![
            quote(1, 1, Some(120.0)),
            quote(2, 1, Some(80.0)),
            quote(3, 2, None),
            quote(4, 1, Some(100.0)),
            quote(5, 2, Some(60.0)),
        ]);
        let cheapest = cheapest_per_destination(quotes, 2);
        let ids: Vec<i64> = cheapest.iter().map(|q| q.flight_id).collect();
        assert_eq!(ids, vec![5, 2, 4, 3]);
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("Amadeus".parse::<FlightProvider>().unwrap(), FlightProvider::Amadeus);
        assert!("kayak".parse::<FlightProvider>().is_err());
        assert_eq!(FlightProvider::default().to_string(), "skyscanner");
    }

    #[test]
    fn test_search_key_ignores_destination_order() {
        let a = FlightSearch {
            origin: "LHR".into(),
            destinations: vec!["RHO".into(), "ALC".into()],
            departure_date: date(11),
            return_date: date(18),
        };
        let mut b = a.clone();
        b.destinations.reverse();
        assert_eq!(a.cache_key().render(), b.cache_key().render());
    }
}
