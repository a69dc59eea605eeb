//! Caching primitives
//!
//! - [`TtlCache`]: in-memory, bounded, per-entry expiry with LRU eviction
//! - [`FileCache`]: one file per key on disk, used by the fetch layer
//! - [`CacheKey`]: builds keys whose argument order does not matter
//!
//! Caches are plain values owned by whoever constructs them; nothing here is
//! global.

pub mod file;
pub mod key;
pub mod ttl;

pub use file::FileCache;
pub use key::CacheKey;
pub use ttl::{CacheStats, TtlCache};
