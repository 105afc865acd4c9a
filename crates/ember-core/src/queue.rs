use chrono::{DateTime, Utc};
use uuid::Uuid;

use ember_types::models::QueueEntry;

use crate::engine::EngineState;

/// Create a live queue entry for a user. The caller has already verified the
/// one-entry-per-user invariant.
pub(crate) fn insert_entry(
    state: &mut EngineState,
    user_id: Uuid,
    nickname: String,
    now: DateTime<Utc>,
) {
    state.queue.insert(
        user_id,
        QueueEntry {
            user_id,
            nickname,
            created_at: now,
            matched: false,
            matched_at: None,
            last_active: now,
        },
    );
}

/// Idempotent removal. Returns true if an entry existed.
pub(crate) fn remove_entry(state: &mut EngineState, user_id: Uuid) -> bool {
    state.queue.remove(&user_id).is_some()
}

/// Select the pairing candidate for `requester` from a snapshot of the queue.
///
/// Excludes the requester's own entry, entries already claimed by a pairing
/// transaction, and any candidate inside the rejection cooldown window
/// (checked in both directions). Among the remainder, picks the earliest
/// `created_at`; ties break on the user-id total order, never on map
/// iteration order.
pub(crate) fn select_candidate(
    state: &EngineState,
    requester: Uuid,
    now: DateTime<Utc>,
) -> Option<Uuid> {
    state
        .queue
        .values()
        .filter(|e| e.user_id != requester && !e.matched)
        .filter(|e| !state.rejections.is_cooling_down(requester, e.user_id, now))
        .min_by_key(|e| (e.created_at, e.user_id))
        .map(|e| e.user_id)
}
