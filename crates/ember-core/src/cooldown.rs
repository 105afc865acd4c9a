use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// How long a rejected pair stays blocked from re-pairing.
pub const COOLDOWN_WINDOW_MS: i64 = 60_000;

/// Rejection ledger keyed (rejecter, rejected) -> timestamp.
///
/// The gate check is direction-independent: a rejection in either direction
/// blocks re-pairing while inside the window. Entries past the window are
/// pruned inline on record and by the server's periodic sweep, so the ledger
/// stays bounded by recent activity.
#[derive(Debug, Default)]
pub struct RejectionLedger {
    entries: HashMap<(Uuid, Uuid), DateTime<Utc>>,
}

impl RejectionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rejection by `rejecter` against `rejected` at time `t`.
    /// A repeat rejection of the same pair restarts the window.
    pub fn record(&mut self, rejecter: Uuid, rejected: Uuid, t: DateTime<Utc>) {
        self.entries.insert((rejecter, rejected), t);
        self.prune(t);
    }

    /// True if either direction of the pair was rejected within the window.
    pub fn is_cooling_down(&self, a: Uuid, b: Uuid, now: DateTime<Utc>) -> bool {
        [(a, b), (b, a)].iter().any(|key| {
            self.entries
                .get(key)
                .is_some_and(|t| within_window(*t, now))
        })
    }

    /// Drop entries older than the window. Returns the number removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, t| within_window(*t, now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn within_window(t: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let elapsed = now.signed_duration_since(t).num_milliseconds();
    // A future timestamp (clock skew) still counts as cooling down.
    elapsed < COOLDOWN_WINDOW_MS
}
