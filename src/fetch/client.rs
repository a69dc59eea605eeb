//! Shared plumbing for provider clients: credentials, rate limiting and the
//! on-disk response cache

use crate::cache::{CacheKey, FileCache};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const WINDOW: Duration = Duration::from_secs(60);

/// Provider credentials; both parts are optional
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl Credentials {
    /// Create credentials from an API key alone
    #[must_use]
    pub fn with_key(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: None,
        }
    }

    #[must_use]
    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Rate limiter for API requests
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum requests per minute
    max_requests_per_minute: u32,
    /// Request timestamps within the last minute
    request_times: Vec<Instant>,
}

impl RateLimiter {
    /// Create a new rate limiter
    #[must_use]
    pub fn new(max_requests_per_minute: u32) -> Self {
        Self {
            max_requests_per_minute: max_requests_per_minute.max(1),
            request_times: Vec::new(),
        }
    }

    /// Check if a request is allowed and record it
    pub fn allow_request(&mut self) -> bool {
        self.cleanup_old_requests();

        if self.request_times.len() >= self.max_requests_per_minute as usize {
            false
        } else {
            self.request_times.push(Instant::now());
            true
        }
    }

    /// Get time until next request is allowed
    pub fn time_until_next_request(&mut self) -> Duration {
        self.cleanup_old_requests();

        if self.request_times.len() < self.max_requests_per_minute as usize {
            return Duration::ZERO;
        }
        self.request_times
            .first()
            .map_or(Duration::ZERO, |oldest| WINDOW.saturating_sub(oldest.elapsed()))
    }

    /// Block until a request is allowed, then record it
    pub fn wait_if_needed(&mut self) {
        while !self.allow_request() {
            let wait = self.time_until_next_request();
            info!(wait_ms = wait.as_millis(), "Rate limit reached, waiting");
            thread::sleep(wait.max(Duration::from_millis(1)));
        }
    }

    /// Remove requests older than the window
    fn cleanup_old_requests(&mut self) {
        self.request_times.retain(|time| time.elapsed() < WINDOW);
    }
}

/// Credentials, rate limiter, cache and fallback tag of one provider
#[derive(Debug)]
pub struct ApiClient {
    name: &'static str,
    credentials: Credentials,
    rate_limiter: RateLimiter,
    cache: Option<FileCache>,
    fallback_source: String,
}

impl ApiClient {
    /// Create a new client without a response cache
    #[must_use]
    pub fn new(name: &'static str, credentials: Credentials, rate_limit_per_minute: u32, fallback_source: &str) -> Self {
        Self {
            name,
            credentials,
            rate_limiter: RateLimiter::new(rate_limit_per_minute),
            cache: None,
            fallback_source: fallback_source.to_string(),
        }
    }

    /// Attach an on-disk response cache
    #[must_use]
    pub fn with_cache(mut self, cache: FileCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Source tag served when the provider cannot be used
    #[must_use]
    pub fn fallback_source(&self) -> &str {
        &self.fallback_source
    }

    #[must_use]
    pub fn cache(&self) -> Option<&FileCache> {
        self.cache.as_ref()
    }

    /// Wait for the rate limiter before an upstream request
    pub fn throttle(&mut self) {
        self.rate_limiter.wait_if_needed();
    }

    /// Cached response for `key`, if any
    pub fn cached<V: DeserializeOwned>(&self, key: &CacheKey) -> Option<V> {
        let value = self.cache.as_ref()?.get(&key.render());
        if value.is_some() {
            debug!(client = self.name, key = %key, "Serving cached response");
        }
        value
    }

    /// Store a response; failures are logged and otherwise ignored
    pub fn store<V: Serialize>(&self, key: &CacheKey, value: &V) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&key.render(), value) {
                warn!(client = self.name, error = %e, "Failed to cache response");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_blocks_after_limit() {
        let mut limiter = RateLimiter::new(2);
        assert!(limiter.allow_request());
        assert!(limiter.allow_request());
        assert!(!limiter.allow_request());

        let wait = limiter.time_until_next_request();
        assert!(wait > Duration::ZERO);
        assert!(wait <= WINDOW);
    }

    #[test]
    fn test_rate_limiter_zero_means_one() {
        let mut limiter = RateLimiter::new(0);
        assert!(limiter.allow_request());
        assert!(!limiter.allow_request());
    }

    #[test]
    fn test_wait_if_needed_does_not_block_under_limit() {
        let mut limiter = RateLimiter::new(5);
        let started = Instant::now();
        limiter.wait_if_needed();
        limiter.wait_if_needed();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.time_until_next_request(), Duration::ZERO);
    }

    #[test]
    fn test_blank_key_is_no_key() {
        assert!(!Credentials::with_key(Some("  ".into())).has_key());
        assert!(Credentials::with_key(Some("abc123".into())).has_key());
        assert!(!Credentials::default().has_key());
    }

    #[test]
    fn test_client_without_cache_never_hits() {
        let client = ApiClient::new("test", Credentials::default(), 10, "demo1");
        let key = CacheKey::new("anything");
        client.store(&key, &1_u8);
        assert_eq!(client.cached::<u8>(&key), None);
        assert_eq!(client.fallback_source(), "demo1");
    }
}
