//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use muninn::providers::{FragmentStream, ProviderAdapter};
use muninn::{Fragment, GatewayRequest, InFlightRegistry, Muninn, Result, telemetry};

// ============================================================================
// Mock providers
// ============================================================================

struct Answering;

#[async_trait]
impl ProviderAdapter for Answering {
    fn name(&self) -> &str {
        "answering"
    }

    async fn invoke(
        &self,
        _prompt: &str,
        _options: &Value,
        _cancel: CancellationToken,
    ) -> Result<FragmentStream> {
        let fragments = Fragment::complete("42").into_iter().map(Ok);
        Ok(Box::pin(futures_util::stream::iter(fragments)))
    }
}

struct Failing;

#[async_trait]
impl ProviderAdapter for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    async fn invoke(
        &self,
        _prompt: &str,
        _options: &Value,
        _cancel: CancellationToken,
    ) -> Result<FragmentStream> {
        Ok(Box::pin(futures_util::stream::iter(vec![Ok(
            Fragment::error("quota exceeded"),
        )])))
    }
}

/// Fails after a delay, leaving time for an identical request to join.
struct SlowFailing;

#[async_trait]
impl ProviderAdapter for SlowFailing {
    fn name(&self) -> &str {
        "slow-failing"
    }

    async fn invoke(
        &self,
        _prompt: &str,
        _options: &Value,
        _cancel: CancellationToken,
    ) -> Result<FragmentStream> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Box::pin(futures_util::stream::iter(vec![Ok(
            Fragment::error("quota exceeded"),
        )])))
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for a metric name carrying the given `status` label.
fn counter_with_status(snapshot: &SnapshotVec, name: &str, status: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == "status" && l.value() == status)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

// ============================================================================
// Tests
// ============================================================================

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn miss_then_hit_records_cache_and_request_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let gateway = Muninn::builder()
                    .provider("claude", Arc::new(Answering))
                    .build()
                    .unwrap();
                let request = GatewayRequest::new("claude", "meaning of life");
                gateway.handle(&request).await.unwrap();
                gateway.handle(&request).await.unwrap();
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_SETS_TOTAL), 1);
    assert_eq!(
        counter_with_status(&snapshot, telemetry::REQUESTS_TOTAL, "ok"),
        1
    );
    assert_eq!(
        counter_with_status(&snapshot, telemetry::REQUESTS_TOTAL, "cached"),
        1
    );
    assert!(
        has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS),
        "expected a duration histogram entry"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn failed_request_records_error_status() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let gateway = Muninn::builder()
                    .provider("grok", Arc::new(Failing))
                    .build()
                    .unwrap();
                gateway.handle(&GatewayRequest::new("grok", "hi")).await
            })
        })
    });
    assert!(result.is_err());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_status(&snapshot, telemetry::REQUESTS_TOTAL, "error"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_SETS_TOTAL), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn joined_failure_records_error_status() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let (leader, joiner) = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let gateway = Muninn::builder()
                    .provider("grok", Arc::new(SlowFailing))
                    .build()
                    .unwrap();
                let request = GatewayRequest::new("grok", "hi");
                tokio::join!(gateway.handle(&request), async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    gateway.handle(&request).await
                })
            })
        })
    });
    assert!(leader.is_err());
    assert!(joiner.is_err());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_status(&snapshot, telemetry::REQUESTS_TOTAL, "error"),
        2
    );
    assert_eq!(
        counter_with_status(&snapshot, telemetry::REQUESTS_TOTAL, "joined"),
        0
    );
}

#[test]
fn supersede_records_superseded_total() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let registry = InFlightRegistry::new();
        for _ in 0..3 {
            registry.register(registry.next_id(), "panel").unwrap();
        }
        registry.supersede("panel");
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::SUPERSEDED_TOTAL), 2);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let gateway = Muninn::builder()
        .provider("claude", Arc::new(Answering))
        .build()
        .unwrap();
    gateway
        .handle(&GatewayRequest::new("claude", "hello"))
        .await
        .unwrap();
}
