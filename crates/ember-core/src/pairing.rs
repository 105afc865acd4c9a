use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use ember_types::models::{Match, MatchStatus};

use crate::engine::EngineState;
use crate::queue;

/// The pairing transaction: claim the requester's and the best candidate's
/// queue entries, create the Match, and remove both entries.
///
/// Runs under the engine lock, so the whole claim-verify-commit sequence is
/// one atomic transition: an entry is claimed by at most one successful
/// pairing, and a failed precondition leaves no partial state.
pub(crate) fn try_pair(
    state: &mut EngineState,
    requester: Uuid,
    now: DateTime<Utc>,
) -> Option<Match> {
    // The requester must hold a live, unclaimed entry.
    match state.queue.get(&requester) {
        Some(entry) if !entry.matched => {}
        _ => return None,
    }

    let candidate = queue::select_candidate(state, requester, now)?;

    // Claim both entries with a shared token. Both were verified unclaimed
    // above; under the engine lock nothing can interleave with this.
    let claim = Uuid::new_v4();
    for id in [requester, candidate] {
        if let Some(entry) = state.queue.get_mut(&id) {
            entry.matched = true;
            entry.matched_at = Some(claim);
        }
    }

    // Guard against duplicate match creation: if a non-ended match already
    // holds both users, release the claims and bail.
    let duplicate = state
        .matches
        .values()
        .any(|m| m.status != MatchStatus::Ended && m.contains(requester) && m.contains(candidate));
    if duplicate {
        warn!(
            "pairing aborted: live match already holds {} and {}",
            requester, candidate
        );
        for id in [requester, candidate] {
            if let Some(entry) = state.queue.get_mut(&id) {
                entry.matched = false;
                entry.matched_at = None;
            }
        }
        return None;
    }

    // Commit: create the match and consume both entries.
    let mut user_nicknames = HashMap::new();
    for id in [requester, candidate] {
        if let Some(entry) = state.queue.get(&id) {
            user_nicknames.insert(id, entry.nickname.clone());
        }
    }

    let mut users = [requester, candidate];
    users.sort();

    let m = Match {
        id: Uuid::new_v4(),
        users,
        user_nicknames,
        accepted_by: Vec::new(),
        status: MatchStatus::Pending,
        created_at: now,
        rejected_by: None,
        ended_at: None,
    };

    queue::remove_entry(state, requester);
    queue::remove_entry(state, candidate);
    state.matches.insert(m.id, m.clone());

    debug!("paired {} with {} as match {}", requester, candidate, m.id);
    Some(m)
}

/// Pair as many waiting entries as possible, oldest first. Used by the
/// periodic sweep so pairs blocked only by an expired cooldown get matched
/// without waiting for the next queue change.
pub(crate) fn pair_sweep(state: &mut EngineState, now: DateTime<Utc>) -> Vec<Match> {
    let mut waiting: Vec<(DateTime<Utc>, Uuid)> = state
        .queue
        .values()
        .filter(|e| !e.matched)
        .map(|e| (e.created_at, e.user_id))
        .collect();
    waiting.sort();

    let mut paired = Vec::new();
    for (_, user_id) in waiting {
        if !state.queue.contains_key(&user_id) {
            continue; // consumed as someone else's candidate
        }
        if let Some(m) = try_pair(state, user_id, now) {
            paired.push(m);
        }
    }
    paired
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn enqueue(state: &mut EngineState, name: &str, at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        queue::insert_entry(state, id, name.to_string(), at);
        id
    }

    #[test]
    fn pairs_two_waiting_users() {
        let mut state = EngineState::new();
        let now = Utc::now();
        let a = enqueue(&mut state, "ana", now - Duration::seconds(1));
        let b = enqueue(&mut state, "ben", now);

        let m = try_pair(&mut state, b, now).expect("pair");
        assert!(m.contains(a) && m.contains(b));
        assert_eq!(m.status, MatchStatus::Pending);
        assert!(m.accepted_by.is_empty());
        assert_eq!(m.nickname_of(a), "ana");
        assert!(state.queue.is_empty());
        assert_eq!(state.matches.len(), 1);
    }

    #[test]
    fn lone_requester_stays_queued() {
        let mut state = EngineState::new();
        let now = Utc::now();
        let a = enqueue(&mut state, "ana", now);

        assert!(try_pair(&mut state, a, now).is_none());
        assert_eq!(state.queue.len(), 1);
        assert!(!state.queue[&a].matched);
    }

    #[test]
    fn cooldown_blocks_the_pair() {
        let mut state = EngineState::new();
        let now = Utc::now();
        let a = enqueue(&mut state, "ana", now - Duration::seconds(1));
        let b = enqueue(&mut state, "ben", now);
        state.rejections.record(a, b, now);

        assert!(try_pair(&mut state, b, now).is_none());
        assert_eq!(state.queue.len(), 2);
    }

    #[test]
    fn duplicate_live_match_aborts_without_partial_state() {
        let mut state = EngineState::new();
        let now = Utc::now();
        let a = enqueue(&mut state, "ana", now - Duration::seconds(1));
        let b = enqueue(&mut state, "ben", now);

        let existing = try_pair(&mut state, b, now).expect("first pair");

        // Re-create the queue entries behind the live match.
        queue::insert_entry(&mut state, a, "ana".to_string(), now);
        queue::insert_entry(&mut state, b, "ben".to_string(), now);

        assert!(try_pair(&mut state, b, now).is_none());
        assert_eq!(state.matches.len(), 1);
        assert_eq!(state.matches[&existing.id].status, MatchStatus::Pending);
        // Claims were rolled back, entries remain live.
        assert!(!state.queue[&a].matched);
        assert!(!state.queue[&b].matched);
    }

    #[test]
    fn sweep_pairs_oldest_first() {
        let mut state = EngineState::new();
        let now = Utc::now();
        let a = enqueue(&mut state, "a", now - Duration::seconds(40));
        let b = enqueue(&mut state, "b", now - Duration::seconds(30));
        let c = enqueue(&mut state, "c", now - Duration::seconds(20));
        let d = enqueue(&mut state, "d", now - Duration::seconds(10));

        let paired = pair_sweep(&mut state, now);
        assert_eq!(paired.len(), 2);
        assert!(paired[0].contains(a) && paired[0].contains(b));
        assert!(paired[1].contains(c) && paired[1].contains(d));
        assert!(state.queue.is_empty());
    }

    #[test]
    fn sweep_leaves_an_odd_user_waiting() {
        let mut state = EngineState::new();
        let now = Utc::now();
        enqueue(&mut state, "a", now - Duration::seconds(2));
        enqueue(&mut state, "b", now - Duration::seconds(1));
        let c = enqueue(&mut state, "c", now);

        let paired = pair_sweep(&mut state, now);
        assert_eq!(paired.len(), 1);
        assert_eq!(state.queue.len(), 1);
        assert!(state.queue.contains_key(&c));
    }
}
