//! Request orchestration: cache, join, supersede, call, normalize.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, instrument, warn};

use super::singleflight::{self, Claim, SingleFlight};
use crate::cache::{CacheMetrics, ResponseCache};
use crate::fingerprint::CacheKey;
use crate::inflight::{InFlightRegistry, RequestId};
use crate::normalize::{Fragment, Outcome, ResponseNormalizer};
use crate::providers::{FragmentStream, ProviderEntry, ProviderRegistry};
use crate::telemetry;
use crate::types::{GatewayRequest, ModelProfile, ModelProfiles, NormalizedResult};
use crate::{MuninnError, Result};

type Sink = mpsc::Sender<Result<NormalizedResult>>;

/// Stream of progressive results produced by [`Gateway::handle_stream`].
pub type ResultStream = Pin<Box<dyn Stream<Item = Result<NormalizedResult>> + Send>>;

/// The request gateway.
///
/// Cheap to clone; clones share the cache, the in-flight registry and the
/// providers. Build one with [`Muninn::builder`](super::Muninn::builder).
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

struct Inner {
    providers: ProviderRegistry,
    cache: Arc<ResponseCache>,
    inflight: InFlightRegistry,
    flights: Arc<SingleFlight>,
    profiles: ModelProfiles,
    stream_buffer: usize,
}

/// Unregisters an in-flight id when the call ends, however it ends.
struct Registration<'a> {
    registry: &'a InFlightRegistry,
    id: RequestId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

impl Gateway {
    pub(crate) fn new(
        providers: ProviderRegistry,
        cache: ResponseCache,
        profiles: ModelProfiles,
        stream_buffer: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                providers,
                cache: Arc::new(cache),
                inflight: InFlightRegistry::new(),
                flights: Arc::new(SingleFlight::default()),
                profiles,
                stream_buffer,
            }),
        }
    }

    /// Serve a request.
    ///
    /// Returns the cached result when a live one exists, otherwise joins an
    /// identical call already in flight in the same group, otherwise calls
    /// the provider. A
    /// newer request in the same group makes this one fail with
    /// [`MuninnError::Cancelled`]; a provider error fails it with
    /// [`MuninnError::Provider`] and is not cached.
    #[instrument(name = "gateway.handle", skip(self, request), fields(provider = %request.provider, group = %request.group))]
    pub async fn handle(&self, request: &GatewayRequest) -> Result<NormalizedResult> {
        self.execute(request, None).await
    }

    /// Serve a request, yielding progressive snapshots.
    ///
    /// Yields one incomplete snapshot per text-bearing fragment while the
    /// provider streams, then the terminal item: the complete result, or the
    /// error [`handle`](Self::handle) would have returned. Cache hits and
    /// joined calls yield only the terminal item.
    ///
    /// Snapshots pass through a bounded channel, so a slow consumer slows
    /// the upstream read. A consumer that drops the stream does not cancel
    /// the call; it still runs to completion and fills the cache.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn handle_stream(&self, request: GatewayRequest) -> ResultStream {
        let (tx, rx) = mpsc::channel(self.inner.stream_buffer);
        let gateway = self.clone();
        let span = info_span!(
            "gateway.handle_stream",
            provider = %request.provider,
            group = %request.group
        );

        tokio::spawn(
            async move {
                let result = gateway.execute(&request, Some(&tx)).await;
                // consumer may be gone
                let _ = tx.send(result).await;
            }
            .instrument(span),
        );

        Box::pin(ReceiverStream::new(rx))
    }

    async fn execute(&self, request: &GatewayRequest, sink: Option<&Sink>) -> Result<NormalizedResult> {
        let entry = self.inner.providers.resolve(&request.provider)?;
        let key = request.fingerprint()?;
        let provider = request.provider.as_str();

        loop {
            let flight = if request.force_refresh {
                None
            } else {
                if let Some(hit) = self.inner.cache.get(&key) {
                    debug!(?key, "cache hit");
                    record_status(provider, "cached");
                    return Ok(hit);
                }
                debug!(?key, "cache miss");

                match self.inner.flights.claim(key, &request.group) {
                    Claim::Leader(flight) => Some(flight),
                    Claim::Follower(slot) => {
                        debug!(?key, "joining identical in-flight call");
                        match singleflight::follow(slot).await {
                            Some(outcome) => {
                                let status = if outcome.is_completed() {
                                    "joined"
                                } else {
                                    outcome.status()
                                };
                                record_status(provider, status);
                                return into_response(outcome, provider);
                            }
                            // leader went away without an outcome
                            None => continue,
                        }
                    }
                }
            };

            let outcome = self.lead(entry, request, key, sink).await?;
            if let Some(flight) = &flight {
                flight.publish(outcome.clone());
            }
            return into_response(outcome, provider);
        }
    }

    /// Perform the upstream call for `request` and cache a completed result.
    async fn lead(
        &self,
        entry: &ProviderEntry,
        request: &GatewayRequest,
        key: CacheKey,
        sink: Option<&Sink>,
    ) -> Result<Outcome> {
        let inflight = &self.inner.inflight;
        let id = inflight.next_id();
        let (cancel, _) = inflight.register_superseding(id, &request.group)?;
        let _registration = Registration {
            registry: inflight,
            id,
        };
        let started = Instant::now();

        let mut normalizer = ResponseNormalizer::new();
        let invoked = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            invoked = entry.adapter.invoke(&request.prompt, &request.options, cancel.clone()) => Some(invoked),
        };
        match invoked {
            None => normalizer.cancel(),
            Some(Err(e)) => interrupt(&mut normalizer, &cancel, &e),
            Some(Ok(fragments)) => drive(fragments, &mut normalizer, &cancel, sink).await,
        }
        let outcome = normalizer.into_outcome();

        let provider = request.provider.as_str();
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => provider.to_owned(),
            "status" => outcome.status(),
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => provider.to_owned(),
        )
        .record(started.elapsed().as_secs_f64());

        match &outcome {
            Outcome::Completed(result) => {
                let ttl = entry
                    .settings
                    .cache_ttl
                    .unwrap_or_else(|| self.inner.cache.default_ttl());
                self.inner.cache.set(key, result.clone(), ttl);
                debug!(%id, ?key, ttl_secs = ttl.as_secs(), "cached provider response");
            }
            Outcome::Cancelled(_) => debug!(%id, "request cancelled"),
            Outcome::Failed(result) => warn!(
                %id,
                error = result.error_message.as_deref().unwrap_or_default(),
                "provider call failed"
            ),
        }
        Ok(outcome)
    }

    /// Snapshot of the response cache counters.
    pub fn metrics_snapshot(&self) -> CacheMetrics {
        self.inner.cache.metrics()
    }

    /// Drop the cached result for `request`, if any.
    pub fn invalidate(&self, request: &GatewayRequest) -> Result<bool> {
        Ok(self.inner.cache.invalidate(&request.fingerprint()?))
    }

    /// Cancel every in-flight request in `group`, the newest included.
    pub fn cancel_group(&self, group: &str) -> Vec<RequestId> {
        self.inner.inflight.cancel_group(group)
    }

    /// Cancel every in-flight request.
    pub fn cancel_all(&self) -> usize {
        self.inner.inflight.cancel_all()
    }

    /// Start the periodic cache sweep on the current runtime.
    ///
    /// The task ends by itself once every clone of the gateway is dropped.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.inner.cache.spawn_sweeper()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    pub fn inflight(&self) -> &InFlightRegistry {
        &self.inner.inflight
    }

    /// Registered provider names, sorted.
    pub fn providers(&self) -> Vec<&str> {
        self.inner.providers.names()
    }

    pub fn profile(&self, model: &str) -> Option<&ModelProfile> {
        self.inner.profiles.get(model)
    }

    pub fn profiles(&self) -> &ModelProfiles {
        &self.inner.profiles
    }
}

/// Feed fragments into the normalizer until it reaches a terminal state.
async fn drive(
    mut fragments: FragmentStream,
    normalizer: &mut ResponseNormalizer,
    cancel: &CancellationToken,
    sink: Option<&Sink>,
) {
    while !normalizer.is_terminal() {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                normalizer.cancel();
                return;
            }
            next = fragments.next() => next,
        };

        match next {
            None => normalizer.finish(),
            Some(Err(e)) => interrupt(normalizer, cancel, &e),
            Some(Ok(fragment)) => {
                let progressed = carries_text(&fragment);
                normalizer.apply(fragment);
                if progressed
                    && !normalizer.is_terminal()
                    && let Some(sink) = sink
                {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        // a departed consumer does not stop the call
                        _ = sink.send(Ok(normalizer.snapshot())) => {}
                    }
                }
            }
        }
    }
}

fn carries_text(fragment: &Fragment) -> bool {
    match fragment {
        Fragment::TextDelta(text) => !text.is_empty(),
        Fragment::BlockStart { text } => text.as_deref().is_some_and(|t| !t.is_empty()),
        _ => false,
    }
}

/// Terminate the normalizer after an adapter error.
fn interrupt(normalizer: &mut ResponseNormalizer, cancel: &CancellationToken, error: &MuninnError) {
    if cancel.is_cancelled() || error.is_cancelled() {
        normalizer.cancel();
        return;
    }
    let message = match error {
        MuninnError::Provider { message, .. } => message.clone(),
        other => other.to_string(),
    };
    normalizer.fail(message);
}

fn into_response(outcome: Outcome, provider: &str) -> Result<NormalizedResult> {
    match outcome {
        Outcome::Completed(result) => Ok(result),
        Outcome::Cancelled(_) => Err(MuninnError::Cancelled),
        Outcome::Failed(result) => Err(MuninnError::Provider {
            provider: provider.to_string(),
            message: result.error_message.unwrap_or_default(),
        }),
    }
}

fn record_status(provider: &str, status: &'static str) {
    metrics::counter!(telemetry::REQUESTS_TOTAL,
        "provider" => provider.to_owned(),
        "status" => status,
    )
    .increment(1);
}
