//! Cost-of-living provider client

use super::client::{ApiClient, Credentials};
use crate::cache::{CacheKey, FileCache};
use crate::config::DashboardConfig;
use crate::loader::DataLoader;
use crate::merge::latest_costs;
use crate::models::CostRecord;
use crate::table::Table;
use crate::Result;
use std::cmp::Ordering;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Cost-of-living data from a provider, falling back to local files
#[derive(Debug)]
pub struct CostFetcher {
    client: ApiClient,
}

impl CostFetcher {
    /// Create a new fetcher without a response cache
    #[must_use]
    pub fn new(credentials: Credentials, fallback_source: &str) -> Self {
        Self {
            client: ApiClient::new("costs", credentials, 50, fallback_source),
        }
    }

    /// Create a new fetcher from the fetch and cache sections of `config`
    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        let fetch = &config.fetch;
        let cache = FileCache::new(
            Path::new(&config.cache.location).join("costs"),
            Duration::from_secs(fetch.cost_cache_ttl_seconds),
        )?;
        let client = ApiClient::new(
            "costs",
            Credentials::with_key(fetch.cost_api_key.clone()),
            fetch.rate_limit_per_minute,
            &fetch.fallback_source,
        )
        .with_cache(cache);
        Ok(Self { client })
    }

    /// All cost snapshots, served from the response cache when fresh
    #[instrument(skip(self, loader))]
    pub fn fetch_costs(&mut self, loader: &mut DataLoader) -> Result<Table<CostRecord>> {
        let key = CacheKey::new("costs").arg("source", self.client.fallback_source());
        if let Some(hit) = self.client.cached(&key) {
            return Ok(hit);
        }

        let costs = if self.client.credentials().has_key() {
            self.client.throttle();
            info!("Provider integration is a stub, using CSV fallback");
            self.fallback(loader)?
        } else {
            warn!("Cost API key not configured, using CSV fallback");
            self.fallback(loader)?
        };
        self.client.store(&key, &costs);
        Ok(costs)
    }

    /// Cost rows of the fallback source tag
    pub fn fallback(&self, loader: &mut DataLoader) -> Result<Table<CostRecord>> {
        info!(source = self.client.fallback_source(), "Using CSV fallback for cost of living data");
        loader.load_costs(Some(self.client.fallback_source()), false)
    }

    /// Latest cost per destination, cheapest first
    ///
    /// An empty id list compares every destination.
    pub fn cost_comparison(&mut self, loader: &mut DataLoader, destination_ids: &[i64]) -> Result<Table<CostRecord>> {
        let latest = latest_costs(&self.fetch_costs(loader)?);
        let mut records: Vec<CostRecord> = latest
            .into_records()
            .into_iter()
            .filter(|c| destination_ids.is_empty() || destination_ids.contains(&c.destination_id))
            .collect();
        records.sort_by(|a, b| match (a.monthly_living_cost, b.monthly_living_cost) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        Ok(Table::new(records))
    }
}
