use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use lru::LruCache;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::CacheConfig;
use crate::fingerprint::CacheKey;
use crate::telemetry;

/// Upper bound used when `now + ttl` would overflow the clock.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// A stored value with its lifetime bounds.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: CacheKey,
    pub value: V,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-lifetime cache counters.
///
/// `deletes` counts entries removed by sweep, lazy expiry on lookup and
/// explicit invalidation. Capacity evictions are counted in `evictions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    /// Wall-clock time of the last sweep, if any ran.
    pub last_cleanup: Option<SystemTime>,
}

impl CacheMetrics {
    /// Total lookups served (`hits + misses`).
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

struct Inner<V> {
    entries: LruCache<CacheKey, CacheEntry<V>>,
    metrics: CacheMetrics,
}

/// Bounded LRU + TTL store. See the [module docs](super) for guarantees.
pub struct CacheStore<V> {
    inner: Mutex<Inner<V>>,
    default_ttl: Duration,
    sweep_interval: Duration,
}

impl<V: Clone> CacheStore<V> {
    /// Create a store from the given configuration.
    ///
    /// A `max_entries` of zero is treated as one.
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                metrics: CacheMetrics::default(),
            }),
            default_ttl: config.ttl,
            sweep_interval: config.sweep_interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        // every critical section leaves the table consistent, so a panic
        // elsewhere cannot have corrupted it
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The TTL applied by [`insert`](Self::insert).
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a live entry, marking it most recently used.
    ///
    /// An expired entry counts as a miss and is removed immediately.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.lock();

        let found = inner
            .entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));

        let live = match found {
            Some(Some(value)) => Some(value),
            Some(None) => {
                inner.entries.pop(key);
                inner.metrics.deletes += 1;
                metrics::counter!(telemetry::CACHE_DELETES_TOTAL).increment(1);
                None
            }
            None => None,
        };

        match live {
            Some(value) => {
                inner.metrics.hits += 1;
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                Some(value)
            }
            None => {
                inner.metrics.misses += 1;
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Insert or replace an entry that expires after `ttl`.
    ///
    /// When the store is full and `key` is new, the least recently used
    /// entry is evicted first.
    pub fn set(&self, key: CacheKey, value: V, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(MAX_TTL))
            .unwrap_or(now);
        let entry = CacheEntry {
            key,
            value,
            created_at: now,
            expires_at,
        };

        let mut inner = self.lock();
        inner.metrics.sets += 1;
        metrics::counter!(telemetry::CACHE_SETS_TOTAL).increment(1);

        // push hands back the replaced entry for an existing key, or the
        // evicted LRU entry when a new key overflows capacity
        if let Some((displaced, _)) = inner.entries.push(key, entry)
            && displaced != key
        {
            inner.metrics.evictions += 1;
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
            debug!(evicted = ?displaced, "evicted least recently used cache entry");
        }
    }

    /// Insert with the store's default TTL.
    pub fn insert(&self, key: CacheKey, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Remove an entry. Returns whether one was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut inner = self.lock();
        let removed = inner.entries.pop(key).is_some();
        if removed {
            inner.metrics.deletes += 1;
            metrics::counter!(telemetry::CACHE_DELETES_TOTAL).increment(1);
        }
        removed
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();

        let expired: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            inner.entries.pop(key);
        }

        let removed = expired.len();
        inner.metrics.deletes += removed as u64;
        inner.metrics.last_cleanup = Some(SystemTime::now());
        metrics::counter!(telemetry::CACHE_DELETES_TOTAL).increment(removed as u64);
        removed
    }

    /// Inspect an entry without touching recency or counters.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        self.lock().entries.peek(key).cloned()
    }

    /// Whether a live entry exists, without touching recency or counters.
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        self.lock()
            .entries
            .peek(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Snapshot of the counters.
    pub fn metrics(&self) -> CacheMetrics {
        self.lock().metrics.clone()
    }

    /// Number of physically stored entries (expired ones included until swept).
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.lock().entries.cap().get()
    }
}

impl<V: Clone + Send + 'static> CacheStore<V> {
    /// Run [`sweep`](Self::sweep) every `sweep_interval` on the current Tokio runtime.
    ///
    /// The task holds only a weak reference and exits once the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let every = self.sweep_interval.max(Duration::from_millis(1));
        let weak = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = weak.upgrade() else {
                    break;
                };
                let removed = store.sweep();
                if removed > 0 {
                    debug!(removed, "swept expired cache entries");
                }
            }
        })
    }
}
