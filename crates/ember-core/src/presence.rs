use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use ember_types::models::{PresenceStatus, User};

use crate::engine::{EngineState, PresenceChange};

/// Idempotent upsert of a user record. Writes fully overwrite, never merge.
pub(crate) fn publish(state: &mut EngineState, user: User) -> PresenceChange {
    let change = PresenceChange {
        user_id: user.id,
        nickname: user.nickname.clone(),
        status: user.status,
    };
    state.users.insert(user.id, user);
    change
}

/// Transition a user's status. Refuses to overwrite `offline` — the
/// disconnect hook wins until the user reconnects via `publish`. Returns
/// `None` when nothing changed.
pub(crate) fn transition(
    state: &mut EngineState,
    user_id: Uuid,
    status: PresenceStatus,
    now: DateTime<Utc>,
) -> Option<PresenceChange> {
    let user = state.users.get_mut(&user_id)?;
    if user.status == PresenceStatus::Offline && status != PresenceStatus::Offline {
        debug!("skipping {:?} transition for offline user {}", status, user_id);
        return None;
    }
    if user.status == status {
        return None;
    }
    user.status = status;
    user.last_active = now;
    Some(PresenceChange {
        user_id,
        nickname: user.nickname.clone(),
        status,
    })
}

/// The disconnect hook: flips status -> offline and removes the user's queue
/// entry if present. Runs entirely server-side on connection teardown, with
/// no dependency on graceful client code.
pub(crate) fn disconnect(
    state: &mut EngineState,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> (Option<PresenceChange>, bool) {
    let dequeued = state.queue.remove(&user_id).is_some();
    let change = transition(state, user_id, PresenceStatus::Offline, now);
    (change, dequeued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineState;
    use crate::queue;

    fn user(status: PresenceStatus) -> User {
        User {
            id: Uuid::new_v4(),
            nickname: "ana".to_string(),
            status,
            last_active: Utc::now(),
        }
    }

    #[test]
    fn publish_overwrites_existing_record() {
        let mut state = EngineState::new();
        let mut u = user(PresenceStatus::Online);
        let id = u.id;
        publish(&mut state, u.clone());

        u.nickname = "renamed".to_string();
        u.status = PresenceStatus::Matching;
        publish(&mut state, u);

        let stored = state.users.get(&id).unwrap();
        assert_eq!(stored.nickname, "renamed");
        assert_eq!(stored.status, PresenceStatus::Matching);
    }

    #[test]
    fn transition_skips_offline_users() {
        let mut state = EngineState::new();
        let u = user(PresenceStatus::Offline);
        let id = u.id;
        publish(&mut state, u);

        assert!(transition(&mut state, id, PresenceStatus::Chatting, Utc::now()).is_none());
        assert_eq!(state.users[&id].status, PresenceStatus::Offline);
    }

    #[test]
    fn disconnect_removes_queue_entry_and_goes_offline() {
        let mut state = EngineState::new();
        let u = user(PresenceStatus::Matching);
        let id = u.id;
        publish(&mut state, u);
        queue::insert_entry(&mut state, id, "ana".to_string(), Utc::now());

        let (change, dequeued) = disconnect(&mut state, id, Utc::now());
        assert!(dequeued);
        assert_eq!(change.unwrap().status, PresenceStatus::Offline);
        assert!(state.queue.is_empty());
    }
}
