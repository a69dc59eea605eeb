//! File-backed TTL cache
//!
//! One file per key, holding a postcard envelope with the value, its expiry
//! and its creation time. Unreadable or corrupt files are deleted and treated
//! as misses; they never surface as errors.

use super::key::{hashed, shorten};
use crate::{DashboardError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const EXTENSION: &str = "bin";

#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    value: T,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

/// Persistent cache rooted at one directory
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    default_ttl: Duration,
}

impl FileCache {
    /// Create a new file cache, creating `dir` if needed
    pub fn new<P: Into<PathBuf>>(dir: P, default_ttl: Duration) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, default_ttl })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// File holding the entry for `key`
    ///
    /// Keys that are already file-name safe are used as they are. Any other key
    /// is hashed, so two keys that differ only in unsafe characters never share
    /// a file.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let name = if safe == key { shorten("key", safe) } else { hashed("key", key) };
        self.dir.join(format!("{name}.{EXTENSION}"))
    }

    /// Retrieve a live value; expired or corrupt entries are deleted
    #[tracing::instrument(name = "query_file_cache", level = "debug", skip(self))]
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Key not found");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable cache entry");
                self.discard(&path);
                return None;
            }
        };

        let entry: StoredEntry<V> = match postcard::from_bytes(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt cache entry, removing");
                self.discard(&path);
                return None;
            }
        };

        if Utc::now() > entry.expires_at {
            debug!("Key found but expired");
            self.discard(&path);
            return None;
        }
        debug!(created_at = %entry.created_at, "Key found and still fresh");
        Some(entry.value)
    }

    /// Store a value with the default TTL
    pub fn set<V: Serialize>(&self, key: &str, value: &V) -> Result<()> {
        self.set_with_ttl(key, value, self.default_ttl)
    }

    /// Store a value with an explicit TTL
    #[tracing::instrument(name = "put_file_cache", level = "debug", skip(self, value))]
    pub fn set_with_ttl<V: Serialize>(&self, key: &str, value: &V, ttl: Duration) -> Result<()> {
        let ttl = TimeDelta::from_std(ttl).map_err(|e| DashboardError::cache(format!("TTL overflow: {e}")))?;
        let created_at = Utc::now();
        let expires_at = created_at
            .checked_add_signed(ttl)
            .ok_or_else(|| DashboardError::cache("TTL overflow"))?;
        let entry = StoredEntry {
            value,
            expires_at,
            created_at,
        };
        let bytes = postcard::to_stdvec(&entry)
            .map_err(|e| DashboardError::cache(format!("failed to encode entry: {e}")))?;
        fs::write(self.path_for(key), bytes)?;
        Ok(())
    }

    /// Remove one entry; returns whether a file was deleted
    pub fn remove(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every entry; returns the number of files deleted
    pub fn clear(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        debug!(removed, dir = %self.dir.display(), "Cleared file cache");
        Ok(removed)
    }

    /// Return the cached value or compute, store and return it
    ///
    /// A failure to store the computed value is logged, not returned.
    pub fn get_or_try_insert_with<V, F>(&self, key: &str, compute: F) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<V>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = compute()?;
        if let Err(e) = self.set(key, &value) {
            warn!(key, error = %e, "Failed to persist cache entry");
        }
        Ok(value)
    }

    fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove cache entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Frame, Value};
    use rstest::rstest;
    use std::thread::sleep;
    use tempfile::TempDir;

    fn cache(ttl: Duration) -> (TempDir, FileCache) {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path().join("cache"), ttl).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_set_and_get() {
        let (_dir, cache) = cache(Duration::from_secs(60));
        cache.set("prices", &vec![1.5_f64, 2.5]).unwrap();
        let value: Option<Vec<f64>> = cache.get("prices");
        assert_eq!(value, Some(vec![1.5, 2.5]));
        let missing: Option<Vec<f64>> = cache.get("other");
        assert!(missing.is_none());
    }

    #[test]
    fn test_frame_survives_persistence_with_column_order() {
        let (_dir, cache) = cache(Duration::from_secs(60));
        let frame = Frame::from_rows(
            ["zeta", "alpha"],
            vec![vec![Value::Int(1), Value::Missing], vec![Value::from("x"), Value::Bool(true)]],
        )
        .unwrap();
        cache.set("frame", &frame).unwrap();
        let restored: Frame = cache.get("frame").unwrap();
        assert_eq!(restored.columns(), ["zeta", "alpha"]);
        assert_eq!(restored, frame);
    }

    #[test]
    fn test_expired_entry_is_deleted() {
        let (_dir, cache) = cache(Duration::from_secs(60));
        cache.set_with_ttl("soon", &1_u32, Duration::from_millis(100)).unwrap();
        sleep(Duration::from_millis(300));
        assert!(cache.get::<u32>("soon").is_none());
        assert!(!cache.path_for("soon").exists());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss_and_removed() {
        let (_dir, cache) = cache(Duration::from_secs(60));
        let path = cache.path_for("broken");
        fs::write(&path, b"\xff\xff\xff not postcard").unwrap();
        assert!(cache.get::<String>("broken").is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_clear_and_remove() {
        let (_dir, cache) = cache(Duration::from_secs(60));
        cache.set("a", &1_u8).unwrap();
        cache.set("b", &2_u8).unwrap();
        assert!(cache.remove("a").unwrap());
        assert!(!cache.remove("a").unwrap());
        assert_eq!(cache.clear().unwrap(), 1);
        assert!(cache.get::<u8>("b").is_none());
    }

    #[test]
    fn test_keys_become_safe_file_names() {
        let (_dir, cache) = cache(Duration::from_secs(60));
        let path = cache.path_for("prices_demo1.v2");
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "prices_demo1.v2.bin");

        let path = cache.path_for("flights(origin=LHR,to=[ALC])");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("key_"));
        assert_eq!(name.len(), "key_".len() + 64 + ".bin".len());

        let long = "x".repeat(300);
        let name = cache.path_for(&long);
        assert!(name.file_name().unwrap().to_str().unwrap().starts_with("key_"));
    }

    #[rstest]
    #[case("a/b", "a:b")]
    #[case("a b", "a_b")]
    #[case("flights(to=[ALC])", "flights_to__ALC__")]
    fn test_distinct_keys_get_distinct_files(#[case] first: &str, #[case] second: &str) {
        let (_dir, cache) = cache(Duration::from_secs(60));
        assert_ne!(cache.path_for(first), cache.path_for(second));

        cache.set(first, &1_u8).unwrap();
        cache.set(second, &2_u8).unwrap();
        assert_eq!(cache.get::<u8>(first), Some(1));
        assert_eq!(cache.get::<u8>(second), Some(2));
    }

    #[test]
    fn test_get_or_try_insert_with_computes_once() {
        let (_dir, cache) = cache(Duration::from_secs(60));
        let mut calls = 0;
        for _ in 0..2 {
            let value = cache
                .get_or_try_insert_with("answer", || {
                    calls += 1;
                    Ok(42_i64)
                })
                .unwrap();
            assert_eq!(value, 42);
        }
        assert_eq!(calls, 1);
    }
}
