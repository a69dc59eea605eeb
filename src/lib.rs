//! `Places2Go` - travel destination dashboard data layer
//!
//! This library loads the destination, cost-of-living, flight and weather
//! tables, validates them, and provides filtering, merging, aggregation and
//! caching on top for a presentation layer.

pub mod cache;
pub mod coerce;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod integrity;
pub mod loader;
pub mod logging;
pub mod merge;
pub mod models;
pub mod table;
pub mod validation;

// Re-export core types for public API
pub use cache::{CacheKey, CacheStats, FileCache, TtlCache};
pub use config::DashboardConfig;
pub use error::DashboardError;
pub use fetch::{CostFetcher, Credentials, FlightFetcher, FlightSearch, RateLimiter, WeatherFetcher};
pub use filter::{Filter, Predicate};
pub use integrity::{check_integrity, IntegrityReport};
pub use loader::{DataLoader, FlightQuery, LoadOptions, WeatherQuery};
pub use merge::{aggregate, join, latest_costs, merge_all, JoinMode};
pub use models::{CostRecord, Dataset, Destination, FlightQuote, WeatherObservation};
pub use table::{Frame, Record, Table, Tabular, Value};
pub use validation::{validate, Schema};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, DashboardError>;
