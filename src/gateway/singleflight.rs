//! Join table for identical in-flight calls.
//!
//! The first request for a key becomes the *leader* and performs the
//! upstream call; requests for the same key arriving while it runs become
//! *followers* and wait for the leader's [`Outcome`].
//!
//! Keys include the logical group. Followers inherit the leader's
//! cancellation, and supersession only reaches requests in the leader's
//! own group.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::fingerprint::CacheKey;
use crate::normalize::Outcome;

type Slot = watch::Receiver<Option<Outcome>>;
type FlightKey = (CacheKey, String);

#[derive(Default)]
pub(crate) struct SingleFlight {
    flights: Mutex<HashMap<FlightKey, Slot>>,
}

pub(crate) enum Claim {
    Leader(Flight),
    Follower(Slot),
}

impl SingleFlight {
    fn lock(&self) -> MutexGuard<'_, HashMap<FlightKey, Slot>> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the call in flight for `key` within `group`, or start one.
    pub(crate) fn claim(self: &Arc<Self>, key: CacheKey, group: &str) -> Claim {
        let key = (key, group.to_owned());
        let mut flights = self.lock();
        if let Some(slot) = flights.get(&key) {
            return Claim::Follower(slot.clone());
        }

        let (tx, rx) = watch::channel(None);
        flights.insert(key.clone(), rx);
        Claim::Leader(Flight {
            table: Arc::clone(self),
            key,
            tx,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Leadership of one key. Dropping it ends the flight; followers that have
/// not seen an outcome by then observe a closed channel.
pub(crate) struct Flight {
    table: Arc<SingleFlight>,
    key: FlightKey,
    tx: watch::Sender<Option<Outcome>>,
}

impl Flight {
    pub(crate) fn publish(&self, outcome: Outcome) {
        self.tx.send_replace(Some(outcome));
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        // only this flight can be registered under the key while it lives
        self.table.lock().remove(&self.key);
    }
}

/// Wait for the leader's outcome. `None` means the leader went away
/// without publishing one.
pub(crate) async fn follow(mut slot: Slot) -> Option<Outcome> {
    slot.wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|outcome| (*outcome).clone())
}
