use uuid::Uuid;

use crate::session::MAX_MESSAGE_LEN;

/// How a failed operation should be handled at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input, rejected before any state change; surfaced to the caller.
    Validation,
    /// A transition lost its precondition; logged and dropped, never fatal.
    Conflict,
    /// An expected record is missing; the caller treats the match as ended.
    MissingRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("unknown user: {0}")]
    UnknownUser(Uuid),

    #[error("user is offline")]
    UserOffline,

    #[error("user is already in the matchmaking queue")]
    AlreadyQueued,

    #[error("user already has a live match")]
    AlreadyMatched,

    #[error("no current match")]
    NoCurrentMatch,

    #[error("user is not part of this match")]
    NotInMatch,

    #[error("match is not active")]
    MatchNotActive,

    #[error("message text is empty")]
    EmptyMessage,

    #[error("message text exceeds {MAX_MESSAGE_LEN} characters")]
    MessageTooLong,

    #[error("report reason is empty")]
    EmptyReason,
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AlreadyQueued
            | Self::AlreadyMatched
            | Self::NotInMatch
            | Self::MatchNotActive
            | Self::EmptyMessage
            | Self::MessageTooLong
            | Self::EmptyReason => ErrorClass::Validation,
            Self::UserOffline => ErrorClass::Conflict,
            Self::UnknownUser(_) | Self::NoCurrentMatch => ErrorClass::MissingRecord,
        }
    }
}
