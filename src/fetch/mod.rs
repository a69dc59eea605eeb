//! External data providers
//!
//! Provider integrations are stubs. Every fetcher checks its credentials,
//! respects a per-minute rate limit, caches responses on disk and, whenever a
//! provider cannot be used, serves rows of the configured fallback source tag
//! through the [`DataLoader`](crate::loader::DataLoader). The loader is passed
//! in per call so one loader can back several fetchers.

pub mod client;
pub mod costs;
pub mod flights;
pub mod weather;

pub use client::{ApiClient, Credentials, RateLimiter};
pub use costs::CostFetcher;
pub use flights::{FlightFetcher, FlightProvider, FlightSearch};
pub use weather::WeatherFetcher;
