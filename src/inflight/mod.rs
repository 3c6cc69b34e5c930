//! In-flight request registry.
//!
//! Tracks upstream calls that are currently running so that a newer
//! request can cancel its stale siblings. Requests are grouped by a
//! caller-chosen *logical group* (e.g. one UI panel); within a group only
//! the most recently registered request survives [`InFlightRegistry::supersede`].
//!
//! Cancellation is cooperative: each registered request gets a
//! [`CancellationToken`] that the provider adapter and the response
//! normalizer watch. The registry is an explicit instance owned by the
//! gateway, not a process-wide singleton, so tests get a fresh one each.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::telemetry;
use crate::{MuninnError, Result};

/// Identifier of an upstream call, unique for the lifetime of the registry.
///
/// Ids are issued in strictly increasing order, so comparing two ids
/// compares their arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(u64);

impl RequestId {
    /// Wrap a raw value. Only ids obtained from
    /// [`InFlightRegistry::next_id`] are guaranteed unique.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered upstream call.
#[derive(Debug, Clone)]
pub struct InFlightRequest {
    pub id: RequestId,
    pub group: String,
    pub cancel: CancellationToken,
    pub created_at: Instant,
}

/// Registry of in-flight upstream calls.
pub struct InFlightRegistry {
    next: AtomicU64,
    requests: Mutex<BTreeMap<RequestId, InFlightRequest>>,
}

impl Default for InFlightRegistry {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
            requests: Mutex::new(BTreeMap::new()),
        }
    }
}

impl InFlightRegistry {
    /// Create an empty registry. The first issued id is `#1`.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<RequestId, InFlightRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a fresh id, strictly greater than every id issued before.
    pub fn next_id(&self) -> RequestId {
        // a single atomic RMW is totally ordered, which is all uniqueness needs
        RequestId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a call and hand back its cancellation token.
    ///
    /// Registering an id that is already present is an internal invariant
    /// violation and fails with [`MuninnError::DuplicateRequestId`], leaving
    /// the existing registration untouched.
    pub fn register(&self, id: RequestId, group: &str) -> Result<CancellationToken> {
        let mut requests = self.lock();
        Self::insert(&mut requests, id, group)
    }

    /// Register a call and supersede its older siblings in one step.
    ///
    /// Equivalent to [`register`](Self::register) followed by
    /// [`supersede`](Self::supersede) without another registration slipping
    /// in between. Returns the token and the ids that were cancelled.
    pub fn register_superseding(
        &self,
        id: RequestId,
        group: &str,
    ) -> Result<(CancellationToken, Vec<RequestId>)> {
        let mut requests = self.lock();
        let token = Self::insert(&mut requests, id, group)?;
        let cancelled = Self::cancel_older(&requests, group);
        Ok((token, cancelled))
    }

    fn insert(
        requests: &mut BTreeMap<RequestId, InFlightRequest>,
        id: RequestId,
        group: &str,
    ) -> Result<CancellationToken> {
        if requests.contains_key(&id) {
            error!(%id, group, "request id registered twice");
            return Err(MuninnError::DuplicateRequestId(id));
        }

        let cancel = CancellationToken::new();
        requests.insert(
            id,
            InFlightRequest {
                id,
                group: group.to_string(),
                cancel: cancel.clone(),
                created_at: Instant::now(),
            },
        );
        metrics::gauge!(telemetry::INFLIGHT_REQUESTS).set(requests.len() as f64);
        Ok(cancel)
    }

    /// Cancel every registered request in `group` except the newest one.
    ///
    /// Returns the ids that were cancelled by this call. Requests that were
    /// already cancelled are not reported again.
    pub fn supersede(&self, group: &str) -> Vec<RequestId> {
        let requests = self.lock();
        Self::cancel_older(&requests, group)
    }

    fn cancel_older(requests: &BTreeMap<RequestId, InFlightRequest>, group: &str) -> Vec<RequestId> {
        // BTreeMap iterates in id order, so the last match is the newest
        let newest = requests
            .values()
            .filter(|r| r.group == group)
            .map(|r| r.id)
            .next_back();
        let Some(newest) = newest else {
            return Vec::new();
        };

        let cancelled: Vec<RequestId> = requests
            .values()
            .filter(|r| r.group == group && r.id < newest && !r.cancel.is_cancelled())
            .map(|r| {
                r.cancel.cancel();
                r.id
            })
            .collect();

        if !cancelled.is_empty() {
            metrics::counter!(telemetry::SUPERSEDED_TOTAL).increment(cancelled.len() as u64);
            info!(group, %newest, superseded = ?cancelled, "superseded older requests");
        }
        cancelled
    }

    /// Cancel every registered request in `group`, the newest included.
    pub fn cancel_group(&self, group: &str) -> Vec<RequestId> {
        self.lock()
            .values()
            .filter(|r| r.group == group && !r.cancel.is_cancelled())
            .map(|r| {
                r.cancel.cancel();
                r.id
            })
            .collect()
    }

    /// Cancel every registered request. Returns how many were newly cancelled.
    pub fn cancel_all(&self) -> usize {
        self.lock()
            .values()
            .filter(|r| !r.cancel.is_cancelled())
            .inspect(|r| r.cancel.cancel())
            .count()
    }

    /// Remove a registration regardless of its cancellation state.
    ///
    /// Idempotent: returns `false` if the id was not registered.
    pub fn unregister(&self, id: RequestId) -> bool {
        let mut requests = self.lock();
        let removed = requests.remove(&id).is_some();
        metrics::gauge!(telemetry::INFLIGHT_REQUESTS).set(requests.len() as f64);
        removed
    }

    /// A copy of the registration for `id`, if present.
    pub fn get(&self, id: RequestId) -> Option<InFlightRequest> {
        self.lock().get(&id).cloned()
    }

    pub fn is_registered(&self, id: RequestId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Registered ids in `group`, oldest first.
    pub fn ids_in_group(&self, group: &str) -> Vec<RequestId> {
        self.lock()
            .values()
            .filter(|r| r.group == group)
            .map(|r| r.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
