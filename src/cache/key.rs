//! Order-normalized cache keys
//!
//! Arguments are always rendered sorted by name, and set-valued arguments are
//! sorted too, so two calls with the same arguments in a different order map
//! to the same entry.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Longest key rendered verbatim; longer keys are hashed
pub const MAX_KEY_LEN: usize = 200;

/// Builder for a cache key made of a scope and named arguments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheKey {
    scope: String,
    args: BTreeMap<String, Option<String>>,
}

impl CacheKey {
    /// Create a new key for `scope`, usually the operation name
    #[must_use]
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            args: BTreeMap::new(),
        }
    }

    /// Add a scalar argument
    #[must_use]
    pub fn arg<T: fmt::Display>(mut self, name: &str, value: T) -> Self {
        self.args.insert(name.to_string(), Some(value.to_string()));
        self
    }

    /// Add an optional argument; `None` renders as the bare name, without `=`
    #[must_use]
    pub fn opt_arg<T: fmt::Display>(mut self, name: &str, value: Option<T>) -> Self {
        self.args.insert(name.to_string(), value.map(|v| v.to_string()));
        self
    }

    /// Add an argument whose element order carries no meaning
    #[must_use]
    pub fn set_arg<I, T>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        let mut rendered: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        rendered.sort();
        rendered.dedup();
        self.arg(name, format!("[{}]", rendered.join(",")))
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Final key string, hashed when longer than [`MAX_KEY_LEN`]
    #[must_use]
    pub fn render(&self) -> String {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{k}={v}"),
                None => k.clone(),
            })
            .collect();
        let raw = if args.is_empty() {
            self.scope.clone()
        } else {
            format!("{}({})", self.scope, args.join(","))
        };
        shorten(&self.scope, raw)
    }
}

/// Replace `key` by `prefix_<sha256>` when it is too long to use directly
pub(crate) fn shorten(prefix: &str, key: String) -> String {
    if key.len() <= MAX_KEY_LEN {
        return key;
    }
    hashed(prefix, &key)
}

/// `prefix_<sha256 of key>`
pub(crate) fn hashed(prefix: &str, key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{prefix}_{}", hex::encode(digest))
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.render()
    }
}
