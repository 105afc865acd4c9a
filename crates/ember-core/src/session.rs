use chrono::{DateTime, Utc};
use uuid::Uuid;

use ember_types::models::{MatchStatus, Message};

use crate::engine::EngineState;
use crate::error::EngineError;
use crate::lifecycle;

/// Maximum message length in characters, counted after trimming.
pub const MAX_MESSAGE_LEN: usize = 500;

/// Validate and build a chat message for the sender's active match.
///
/// Refused before any write when the sender has no current match, the match
/// is not active, or the trimmed text is empty or oversized. Ordering among
/// near-simultaneous sends is best-effort by wall-clock timestamp.
pub(crate) fn compose_message(
    state: &EngineState,
    sender_id: Uuid,
    text: &str,
    now: DateTime<Utc>,
) -> Result<Message, EngineError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(EngineError::EmptyMessage);
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(EngineError::MessageTooLong);
    }

    let m = lifecycle::current_match(state, sender_id).ok_or(EngineError::NoCurrentMatch)?;
    if m.status != MatchStatus::Active {
        return Err(EngineError::MatchNotActive);
    }

    Ok(Message {
        id: Uuid::new_v4(),
        match_id: m.id,
        sender_id,
        sender_nickname: m.nickname_of(sender_id).to_string(),
        text: text.to_string(),
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{self, EndKind};
    use crate::pairing;
    use crate::queue;

    fn active_match_state() -> (EngineState, Uuid, Uuid) {
        let mut state = EngineState::new();
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        queue::insert_entry(&mut state, a, "ana".to_string(), now);
        queue::insert_entry(&mut state, b, "ben".to_string(), now);
        pairing::try_pair(&mut state, a, now).expect("pair");
        lifecycle::accept(&mut state, a, now).unwrap();
        lifecycle::accept(&mut state, b, now).unwrap();
        (state, a, b)
    }

    #[test]
    fn sends_into_active_match() {
        let (state, a, _b) = active_match_state();
        let msg = compose_message(&state, a, "  hello there  ", Utc::now()).unwrap();
        assert_eq!(msg.text, "hello there");
        assert_eq!(msg.sender_nickname, "ana");
    }

    #[test]
    fn rejects_empty_and_whitespace_text() {
        let (state, a, _b) = active_match_state();
        assert_eq!(
            compose_message(&state, a, "   ", Utc::now()).unwrap_err(),
            EngineError::EmptyMessage
        );
    }

    #[test]
    fn rejects_oversized_text() {
        let (state, a, _b) = active_match_state();
        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert_eq!(
            compose_message(&state, a, &long, Utc::now()).unwrap_err(),
            EngineError::MessageTooLong
        );
        // Exactly at the limit is fine.
        let exact = "y".repeat(MAX_MESSAGE_LEN);
        assert!(compose_message(&state, a, &exact, Utc::now()).is_ok());
    }

    #[test]
    fn rejects_when_match_is_pending() {
        let mut state = EngineState::new();
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        queue::insert_entry(&mut state, a, "ana".to_string(), now);
        queue::insert_entry(&mut state, b, "ben".to_string(), now);
        pairing::try_pair(&mut state, a, now).expect("pair");

        assert_eq!(
            compose_message(&state, a, "hi", now).unwrap_err(),
            EngineError::MatchNotActive
        );
    }

    #[test]
    fn rejects_after_match_ends() {
        let (mut state, a, _b) = active_match_state();
        lifecycle::end_match(&mut state, a, EndKind::Leave, Utc::now()).unwrap();

        assert_eq!(
            compose_message(&state, a, "hi", Utc::now()).unwrap_err(),
            EngineError::NoCurrentMatch
        );
    }
}
