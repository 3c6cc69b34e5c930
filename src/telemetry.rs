//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider identifier (e.g. "claude", "gemini")
//! - `status`: outcome, "ok", "error", "cancelled", "cached" or "joined"
//!   (a completed result shared from an identical call; failed or cancelled
//!   joins report "error" or "cancelled")
//!
//! The cache store keeps its own [`CacheMetrics`](crate::cache::CacheMetrics)
//! counters for the observability endpoint; the metrics below mirror them
//! for exporters.

/// Total cache lookups that returned a live entry.
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total cache lookups that found no live entry.
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Total cache inserts and replacements.
pub const CACHE_SETS_TOTAL: &str = "muninn_cache_sets_total";

/// Total entries removed by sweep, lazy expiry or invalidation.
pub const CACHE_DELETES_TOTAL: &str = "muninn_cache_deletes_total";

/// Total entries evicted to respect the capacity bound.
pub const CACHE_EVICTIONS_TOTAL: &str = "muninn_cache_evictions_total";

/// Total requests handled by the gateway.
///
/// Labels: `provider`, `status`.
pub const REQUESTS_TOTAL: &str = "muninn_requests_total";

/// Duration of upstream calls in seconds (cache hits are not recorded).
///
/// Labels: `provider`.
pub const REQUEST_DURATION_SECONDS: &str = "muninn_request_duration_seconds";

/// Total in-flight requests cancelled because a newer sibling arrived.
pub const SUPERSEDED_TOTAL: &str = "muninn_superseded_total";

/// Number of upstream calls currently registered as in flight.
pub const INFLIGHT_REQUESTS: &str = "muninn_inflight_requests";
