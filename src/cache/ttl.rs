//! In-memory TTL cache with LRU eviction
//!
//! Expiry is lazy: an expired entry stays in memory until the next `get` for
//! its key, which deletes it and reports a miss. Recency is updated by both
//! `get` and `set`. Not synchronized; wrap it in a lock to share it.

use lru::LruCache;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::debug;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Fraction of lookups that hit, 0.0 when nothing was looked up
    pub hit_rate: f64,
}

/// Bounded key-value cache with per-entry expiry
pub struct TtlCache<K, V> {
    entries: LruCache<K, Entry<V>>,
    default_ttl: Duration,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    /// Create a new cache holding at most `max_size` entries (minimum 1)
    #[must_use]
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN)),
            default_ttl,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a live entry, refreshing its recency
    pub fn get(&mut self, key: &K) -> Option<V> {
        let expired = match self.entries.peek(key) {
            Some(entry) => entry.is_expired(Instant::now()),
            None => {
                self.misses += 1;
                return None;
            }
        };
        if expired {
            self.entries.pop(key);
            self.misses += 1;
            debug!("Cache entry expired");
            return None;
        }
        self.hits += 1;
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert with the default TTL
    pub fn set(&mut self, key: K, value: V) {
        let ttl = self.default_ttl;
        self.set_with_ttl(key, value, ttl);
    }

    /// Insert with an explicit TTL
    ///
    /// When the cache is full and `key` is new, the least recently used entry
    /// is evicted first. Overwriting an existing key never evicts.
    pub fn set_with_ttl(&mut self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or(now + Duration::from_secs(u64::from(u32::MAX)));
        if !self.entries.contains(&key) && self.entries.len() >= self.entries.cap().get() {
            debug!(max_size = self.entries.cap().get(), "Cache full, evicting least recently used entry");
        }
        self.entries.put(key, Entry { value, expires_at });
    }

    /// Return the cached value or compute, store and return it
    pub fn get_or_insert_with<F>(&mut self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();
        self.set(key, value.clone());
        value
    }

    /// Like [`get_or_insert_with`](Self::get_or_insert_with) for fallible
    /// computations; errors are returned and nothing is stored
    pub fn get_or_try_insert_with<F, E>(&mut self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute()?;
        self.set(key, value.clone());
        Ok(value)
    }

    /// Remove an entry, returning its value if it was live
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.pop(key)?;
        (!entry.is_expired(Instant::now())).then_some(entry.value)
    }

    /// Drop every entry and reset statistics
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Number of stored entries, including expired ones not yet purged
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        CacheStats {
            size: self.entries.len(),
            max_size: self.entries.cap().get(),
            hits: self.hits,
            misses: self.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                self.hits as f64 / lookups as f64
            },
        }
    }
}

impl<K: Hash + Eq, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("len", &self.entries.len())
            .field("max_size", &self.entries.cap())
            .field("default_ttl", &self.default_ttl)
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_expires_after_ttl() {
        let mut cache = TtlCache::new(10, Duration::from_secs(60));
        cache.set_with_ttl("short", 1, Duration::from_secs(1));
        cache.set("long", 2);
        assert_eq!(cache.get(&"long"), Some(2));

        sleep(Duration::from_millis(1500));
        assert_eq!(cache.get(&"short"), None);
        assert_eq!(cache.get(&"long"), Some(2));
        // expired entry was purged by the lookup
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_stays_until_looked_up() {
        let mut cache = TtlCache::new(10, Duration::from_millis(10));
        cache.set("a", 1);
        sleep(Duration::from_millis(30));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = TtlCache::new(2, Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = TtlCache::new(2, Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.set("c", 3);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let mut cache = TtlCache::new(2, Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"a"), Some(10));
    }

    #[test]
    fn test_set_refreshes_recency() {
        let mut cache = TtlCache::new(2, Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 3);
        cache.set("c", 4);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(3));
        assert_eq!(cache.get(&"c"), Some(4));
    }

    #[test]
    fn test_stats_and_clear() {
        let mut cache = TtlCache::new(4, Duration::from_secs(60));
        cache.set(1, "x");
        let _ = cache.get(&1);
        let _ = cache.get(&2);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.max_size, 4);

        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hits + stats.misses, 0);
    }

    #[test]
    fn test_get_or_try_insert_with() {
        let mut cache: TtlCache<&str, i32> = TtlCache::new(4, Duration::from_secs(60));
        let mut calls = 0;
        for _ in 0..3 {
            let value: Result<i32, String> = cache.get_or_try_insert_with("k", || {
                calls += 1;
                Ok(7)
            });
            assert_eq!(value, Ok(7));
        }
        assert_eq!(calls, 1);

        let failed: Result<i32, String> = cache.get_or_try_insert_with("bad", || Err("boom".into()));
        assert!(failed.is_err());
        assert_eq!(cache.remove(&"bad"), None);
        assert_eq!(cache.get_or_insert_with("lazy", || 3), 3);
    }
}
