//! Response caching.
//!
//! [`CacheStore`] is a bounded, in-memory key→value map with per-entry
//! time-to-live, exact least-recently-used eviction and process-lifetime
//! counters ([`CacheMetrics`]). The gateway uses it as [`ResponseCache`],
//! keyed on request [`CacheKey`](crate::fingerprint::CacheKey)s.
//!
//! # Consistency
//!
//! The entry table and the counters sit behind a single mutex, so every
//! `get`/`set`/`invalidate`/`sweep` appears to happen atomically and
//! `hits + misses` always equals the number of lookups. The lock is never
//! held across an await point.
//!
//! # Expiry
//!
//! An entry whose deadline has passed is logically absent: `get` reports a
//! miss and removes it on the spot. [`CacheStore::spawn_sweeper`] removes
//! the rest periodically.
//!
//! Entries live only as long as the process. There is no persistence and no
//! sharing between processes.

mod store;

pub use store::{CacheEntry, CacheMetrics, CacheStore};

use std::time::Duration;

use crate::types::NormalizedResult;

/// Cache of normalized provider responses, keyed on request fingerprint.
pub type ResponseCache = CacheStore<NormalizedResult>;

/// Configuration for the response cache.
///
/// ```rust
/// # use muninn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(10_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 1,000.
    pub max_entries: usize,
    /// Default time-to-live for cached entries. Default: 10 minutes.
    pub ttl: Duration,
    /// How often the background sweeper removes expired entries. Default: 5 minutes.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the default time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the background sweep interval.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
