use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's externally visible availability state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Matching,
    Chatting,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub nickname: String,
    pub status: PresenceStatus,
    pub last_active: DateTime<Utc>,
}

/// A user's standing request to be paired. At most one live entry per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub user_id: Uuid,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
    /// Set when a pairing transaction claims this entry.
    pub matched: bool,
    /// Claim token shared by the two entries of one pairing transaction.
    pub matched_at: Option<Uuid>,
    pub last_active: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Active,
    Ended,
}

/// A pairing between two users. Status only ever moves forward:
/// pending -> active, pending -> ended, active -> ended. Ended is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub users: [Uuid; 2],
    pub user_nicknames: HashMap<Uuid, String>,
    pub accepted_by: Vec<Uuid>,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub rejected_by: Option<Uuid>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn contains(&self, user_id: Uuid) -> bool {
        self.users.contains(&user_id)
    }

    /// The other participant, if `user_id` is one of the two.
    pub fn other_user(&self, user_id: Uuid) -> Option<Uuid> {
        match self.users {
            [a, b] if a == user_id => Some(b),
            [a, b] if b == user_id => Some(a),
            _ => None,
        }
    }

    pub fn nickname_of(&self, user_id: Uuid) -> &str {
        self.user_nicknames
            .get(&user_id)
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub match_id: Uuid,
    pub sender_id: Uuid,
    pub sender_nickname: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub reporter_nickname: String,
    pub reported_id: Uuid,
    pub reported_nickname: String,
    pub match_id: Uuid,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
