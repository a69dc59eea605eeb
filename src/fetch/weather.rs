//! Weather forecast provider client

use super::client::{ApiClient, Credentials};
use crate::cache::{CacheKey, FileCache};
use crate::config::DashboardConfig;
use crate::filter::Filter;
use crate::loader::{DataLoader, WeatherQuery};
use crate::models::WeatherObservation;
use crate::table::Table;
use crate::Result;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Weather forecasts from a provider, falling back to local files
#[derive(Debug)]
pub struct WeatherFetcher {
    client: ApiClient,
}

impl WeatherFetcher {
    /// Create a new fetcher without a response cache
    #[must_use]
    pub fn new(credentials: Credentials, fallback_source: &str) -> Self {
        Self {
            client: ApiClient::new("weather", credentials, 50, fallback_source),
        }
    }

    /// Create a new fetcher from the fetch and cache sections of `config`
    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        let fetch = &config.fetch;
        let cache = FileCache::new(
            Path::new(&config.cache.location).join("weather"),
            Duration::from_secs(fetch.weather_cache_ttl_seconds),
        )?;
        let client = ApiClient::new(
            "weather",
            Credentials::with_key(fetch.weather_api_key.clone()),
            fetch.rate_limit_per_minute,
            &fetch.fallback_source,
        )
        .with_cache(cache);
        Ok(Self { client })
    }

    /// Forecasts for the given destinations; an empty list means all of them
    #[instrument(skip(self, loader))]
    pub fn fetch_forecast(&mut self, loader: &mut DataLoader, destination_ids: &[i64]) -> Result<Table<WeatherObservation>> {
        let key = CacheKey::new("weather_forecast").set_arg("ids", destination_ids);
        if let Some(hit) = self.client.cached(&key) {
            return Ok(hit);
        }

        let forecast = if self.client.credentials().has_key() {
            self.client.throttle();
            info!(destinations = destination_ids.len(), "Provider integration is a stub, using CSV fallback");
            self.fallback(loader, destination_ids)?
        } else {
            warn!("Weather API key not configured, using CSV fallback");
            self.fallback(loader, destination_ids)?
        };
        self.client.store(&key, &forecast);
        Ok(forecast)
    }

    /// Forecast rows of the fallback source tag
    pub fn fallback(&self, loader: &mut DataLoader, destination_ids: &[i64]) -> Result<Table<WeatherObservation>> {
        info!(source = self.client.fallback_source(), "Using CSV fallback for weather data");
        let weather = loader.load_weather(
            &WeatherQuery::new()
                .source(self.client.fallback_source())
                .forecast_only(),
        )?;
        Filter::new()
            .one_of("destination_id", destination_ids.iter().copied())
            .apply(&weather)
    }
}
