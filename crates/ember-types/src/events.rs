use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Match, Message, PresenceStatus};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is live
    Ready { user_id: Uuid, nickname: String },

    /// A user's presence status changed
    PresenceUpdate {
        user_id: Uuid,
        nickname: String,
        status: PresenceStatus,
    },

    /// The requesting user entered the matchmaking queue
    QueueEntered { user_id: Uuid },

    /// The requesting user left the matchmaking queue
    QueueExited { user_id: Uuid },

    /// A pairing transaction produced a pending match for this user
    MatchFound(Match),

    /// The match record changed (e.g. one side accepted)
    MatchUpdate(Match),

    /// Both sides accepted; the chat session is open
    MatchStarted(Match),

    /// The match reached its terminal state
    MatchEnded(Match),

    /// A message was posted in this user's active match
    MessageCreate(Message),

    /// A send was refused before any write (validation or closed session)
    SendRejected { reason: String },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Enter the matchmaking queue
    EnterQueue,

    /// Leave the matchmaking queue (idempotent)
    ExitQueue,

    /// Accept the current pending match
    Accept,

    /// Reject the current pending match (starts the cooldown for this pair)
    Reject,

    /// Leave the current match
    Leave,

    /// End the current match without accepting or rejecting
    ForceEnd,

    /// Send a chat message in the active match
    SendChat { text: String },

    /// Report the other participant of the current match
    Report { reason: String },
}
