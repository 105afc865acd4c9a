use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use ember_types::models::{Match, MatchStatus, PresenceStatus};

use crate::engine::{EngineState, PresenceChange};
use crate::error::EngineError;
use crate::presence;

/// How a match is being ended. Only a rejection feeds the cooldown ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EndKind {
    Reject,
    Leave,
}

/// The user's current non-ended match, if any. The pairing transaction's
/// duplicate guard and the enqueue precondition keep this unique.
pub(crate) fn current_match(state: &EngineState, user_id: Uuid) -> Option<&Match> {
    state
        .matches
        .values()
        .find(|m| m.status != MatchStatus::Ended && m.contains(user_id))
}

/// Apply one user's acceptance to their pending match.
///
/// The whole read-modify-write runs under the engine lock: two
/// near-simultaneous accepts serialize, so the second one always observes
/// the first's write and the pending -> active transition cannot be lost.
/// Re-accepting is a no-op. Returns the updated match, whether this call
/// activated it, and any presence changes.
pub(crate) fn accept(
    state: &mut EngineState,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(Match, bool, Vec<PresenceChange>), EngineError> {
    let match_id = current_match(state, user_id)
        .ok_or(EngineError::NoCurrentMatch)?
        .id;

    let (activated, users) = {
        let m = state
            .matches
            .get_mut(&match_id)
            .ok_or(EngineError::NoCurrentMatch)?;

        if !m.accepted_by.contains(&user_id) {
            m.accepted_by.push(user_id);
        }

        let activated = m.status == MatchStatus::Pending && m.accepted_by.len() == 2;
        if activated {
            m.status = MatchStatus::Active;
            debug!("match {} is active", match_id);
        }
        (activated, m.users)
    };

    let mut presence_changes = Vec::new();
    if activated {
        for uid in users {
            if let Some(change) = presence::transition(state, uid, PresenceStatus::Chatting, now) {
                presence_changes.push(change);
            }
        }
    }

    let updated = state.matches[&match_id].clone();
    Ok((updated, activated, presence_changes))
}

/// End a pending or active match: reject, leave, or force-end.
///
/// Rejection additionally records a cooldown entry against the other user;
/// leave/force-end record nothing. `ended` is absorbing: a match never
/// leaves it, so a second end attempt finds no current match and reports
/// MissingRecord.
pub(crate) fn end_match(
    state: &mut EngineState,
    user_id: Uuid,
    kind: EndKind,
    now: DateTime<Utc>,
) -> Result<(Match, Vec<PresenceChange>), EngineError> {
    let (match_id, other) = {
        let m = current_match(state, user_id).ok_or(EngineError::NoCurrentMatch)?;
        (m.id, m.other_user(user_id))
    };

    if kind == EndKind::Reject {
        if let Some(other) = other {
            state.rejections.record(user_id, other, now);
        }
    }

    let users = {
        let m = state
            .matches
            .get_mut(&match_id)
            .ok_or(EngineError::NoCurrentMatch)?;
        m.status = MatchStatus::Ended;
        m.ended_at = Some(now);
        if kind == EndKind::Reject {
            m.rejected_by = Some(user_id);
        }
        m.users
    };
    let mut presence_changes = Vec::new();
    for uid in users {
        if let Some(change) = presence::transition(state, uid, PresenceStatus::Online, now) {
            presence_changes.push(change);
        }
    }

    debug!("match {} ended ({:?}) by {}", match_id, kind, user_id);
    Ok((state.matches[&match_id].clone(), presence_changes))
}
