use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use ember_types::models::{Match, MatchStatus, Message, PresenceStatus, QueueEntry, Report, User};

use crate::cooldown::RejectionLedger;
use crate::error::EngineError;
use crate::lifecycle::{self, EndKind};
use crate::pairing;
use crate::presence;
use crate::queue;
use crate::session;

/// Authoritative in-memory state: users, queue, match table, cooldown ledger.
///
/// All of it lives behind one mutex; every operation is a single serialized
/// transition, which is what makes the pairing and accept read-modify-writes
/// atomic without optimistic retries.
pub(crate) struct EngineState {
    pub(crate) users: HashMap<Uuid, User>,
    pub(crate) queue: HashMap<Uuid, QueueEntry>,
    pub(crate) matches: HashMap<Uuid, Match>,
    pub(crate) rejections: RejectionLedger,
}

impl EngineState {
    pub(crate) fn new() -> Self {
        Self {
            users: HashMap::new(),
            queue: HashMap::new(),
            matches: HashMap::new(),
            rejections: RejectionLedger::new(),
        }
    }
}

/// A presence transition to fan out to subscribers.
#[derive(Debug, Clone)]
pub struct PresenceChange {
    pub user_id: Uuid,
    pub nickname: String,
    pub status: PresenceStatus,
}

pub struct ConnectOutcome {
    pub presence: PresenceChange,
    /// Everyone else currently visible, sent to the joining client before
    /// its own presence broadcast.
    pub roster: Vec<User>,
    /// The user's non-ended match, if one survived a reconnect.
    pub current: Option<Match>,
}

#[derive(Debug)]
pub struct EnqueueOutcome {
    pub presence: Option<PresenceChange>,
    /// Set when this enqueue immediately produced a pairing.
    pub paired: Option<Match>,
}

pub struct DequeueOutcome {
    pub removed: bool,
    pub presence: Option<PresenceChange>,
}

pub struct AcceptOutcome {
    pub updated: Match,
    pub activated: bool,
    pub presence: Vec<PresenceChange>,
}

pub struct EndOutcome {
    pub ended: Match,
    pub presence: Vec<PresenceChange>,
}

pub struct DisconnectOutcome {
    pub presence: Option<PresenceChange>,
    pub dequeued: bool,
}

pub struct SweepOutcome {
    pub pruned: usize,
    pub paired: Vec<Match>,
}

/// The matchmaking engine. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Engine {
    state: Arc<Mutex<EngineState>>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().expect("engine state lock poisoned")
    }

    /// Publish the user online. Status is derived from any surviving match
    /// so a reconnect lands back in the right place.
    pub fn connect(&self, user_id: Uuid, nickname: &str) -> ConnectOutcome {
        let now = Utc::now();
        let mut state = self.lock();

        let status = match lifecycle::current_match(&state, user_id).map(|m| m.status) {
            Some(MatchStatus::Active) => PresenceStatus::Chatting,
            Some(_) => PresenceStatus::Matching,
            None => PresenceStatus::Online,
        };

        let presence = presence::publish(
            &mut state,
            User {
                id: user_id,
                nickname: nickname.to_string(),
                status,
                last_active: now,
            },
        );

        let roster = state
            .users
            .values()
            .filter(|u| u.id != user_id && u.status != PresenceStatus::Offline)
            .cloned()
            .collect();
        let current = lifecycle::current_match(&state, user_id).cloned();

        info!("{} ({}) connected", nickname, user_id);
        ConnectOutcome {
            presence,
            roster,
            current,
        }
    }

    /// Enter the matchmaking queue and immediately attempt a pairing.
    pub fn enqueue(&self, user_id: Uuid) -> Result<EnqueueOutcome, EngineError> {
        let now = Utc::now();
        let mut state = self.lock();

        let user = state
            .users
            .get(&user_id)
            .ok_or(EngineError::UnknownUser(user_id))?;
        if user.status == PresenceStatus::Offline {
            return Err(EngineError::UserOffline);
        }
        let nickname = user.nickname.clone();
        if state.queue.contains_key(&user_id) {
            return Err(EngineError::AlreadyQueued);
        }
        if lifecycle::current_match(&state, user_id).is_some() {
            return Err(EngineError::AlreadyMatched);
        }

        queue::insert_entry(&mut state, user_id, nickname, now);
        let presence = presence::transition(&mut state, user_id, PresenceStatus::Matching, now);
        let paired = pairing::try_pair(&mut state, user_id, now);

        debug!("{} entered queue (paired: {})", user_id, paired.is_some());
        Ok(EnqueueOutcome { presence, paired })
    }

    /// Leave the queue. Idempotent: leaving while not queued is a no-op.
    pub fn dequeue(&self, user_id: Uuid) -> DequeueOutcome {
        let now = Utc::now();
        let mut state = self.lock();

        let removed = queue::remove_entry(&mut state, user_id);
        let presence = if removed {
            presence::transition(&mut state, user_id, PresenceStatus::Online, now)
        } else {
            None
        };
        DequeueOutcome { removed, presence }
    }

    pub fn accept(&self, user_id: Uuid) -> Result<AcceptOutcome, EngineError> {
        let now = Utc::now();
        let mut state = self.lock();
        let (updated, activated, presence) = lifecycle::accept(&mut state, user_id, now)?;
        Ok(AcceptOutcome {
            updated,
            activated,
            presence,
        })
    }

    /// Reject the current match, recording a cooldown entry for the pair.
    pub fn reject(&self, user_id: Uuid) -> Result<EndOutcome, EngineError> {
        let now = Utc::now();
        let mut state = self.lock();
        let (ended, presence) = lifecycle::end_match(&mut state, user_id, EndKind::Reject, now)?;
        Ok(EndOutcome { ended, presence })
    }

    /// Leave the current match. Records no rejection.
    pub fn leave(&self, user_id: Uuid) -> Result<EndOutcome, EngineError> {
        let now = Utc::now();
        let mut state = self.lock();
        let (ended, presence) = lifecycle::end_match(&mut state, user_id, EndKind::Leave, now)?;
        Ok(EndOutcome { ended, presence })
    }

    /// End the current match without the accept/reject handshake completing.
    /// Same transition as `leave`; a separate entry point for the pre-accept
    /// cancel path.
    pub fn force_end(&self, user_id: Uuid) -> Result<EndOutcome, EngineError> {
        self.leave(user_id)
    }

    /// Validate and stamp a chat message for the sender's active match.
    /// The caller persists and delivers it.
    pub fn send_message(&self, sender_id: Uuid, text: &str) -> Result<Message, EngineError> {
        let now = Utc::now();
        let mut state = self.lock();
        let message = session::compose_message(&state, sender_id, text, now)?;
        if let Some(user) = state.users.get_mut(&sender_id) {
            user.last_active = now;
        }
        Ok(message)
    }

    /// Build a report against the other participant of a match. With no
    /// explicit match id, the reporter's current match is used. Appended
    /// unconditionally by the caller: no dedup, no rate limiting.
    pub fn build_report(
        &self,
        reporter_id: Uuid,
        match_id: Option<Uuid>,
        reason: &str,
    ) -> Result<Report, EngineError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::EmptyReason);
        }

        let now = Utc::now();
        let state = self.lock();

        let m = match match_id {
            Some(id) => state.matches.get(&id).ok_or(EngineError::NoCurrentMatch)?,
            None => {
                lifecycle::current_match(&state, reporter_id).ok_or(EngineError::NoCurrentMatch)?
            }
        };
        if !m.contains(reporter_id) {
            return Err(EngineError::NotInMatch);
        }
        let reported_id = m.other_user(reporter_id).ok_or(EngineError::NotInMatch)?;

        Ok(Report {
            id: Uuid::new_v4(),
            reporter_id,
            reporter_nickname: m.nickname_of(reporter_id).to_string(),
            reported_id,
            reported_nickname: m.nickname_of(reported_id).to_string(),
            match_id: m.id,
            reason: reason.to_string(),
            created_at: now,
        })
    }

    /// The disconnect hook (§ presence): flips the user offline and removes
    /// any queue entry, independent of the client's own shutdown path.
    pub fn disconnect(&self, user_id: Uuid) -> DisconnectOutcome {
        let now = Utc::now();
        let mut state = self.lock();
        let (presence, dequeued) = presence::disconnect(&mut state, user_id, now);
        if dequeued {
            debug!("{} removed from queue on disconnect", user_id);
        }
        DisconnectOutcome { presence, dequeued }
    }

    /// Periodic maintenance: evict expired cooldown entries, then pair any
    /// waiting users the expiry unblocked.
    pub fn sweep(&self) -> SweepOutcome {
        let now = Utc::now();
        let mut state = self.lock();
        let pruned = state.rejections.prune(now);
        let paired = pairing::pair_sweep(&mut state, now);
        SweepOutcome { pruned, paired }
    }

    // -- Read-only observation surface --

    pub fn current_match(&self, user_id: Uuid) -> Option<Match> {
        lifecycle::current_match(&self.lock(), user_id).cloned()
    }

    pub fn match_snapshot(&self, match_id: Uuid) -> Option<Match> {
        self.lock().matches.get(&match_id).cloned()
    }

    pub fn matches_snapshot(&self) -> Vec<Match> {
        self.lock().matches.values().cloned().collect()
    }

    pub fn presence_of(&self, user_id: Uuid) -> Option<PresenceStatus> {
        self.lock().users.get(&user_id).map(|u| u.status)
    }

    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
