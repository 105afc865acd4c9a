//! The matchmaking engine: authoritative queue, match table, presence and
//! cooldown state for anonymous one-on-one chat.
//!
//! All coordination state lives in memory behind a single lock; gateway and
//! REST layers call into [`Engine`] and fan the returned outcomes out to
//! connected clients. Nothing here touches the network or the database.

pub mod cooldown;
pub mod engine;
pub mod error;
mod lifecycle;
mod pairing;
mod presence;
mod queue;
pub mod session;

pub use cooldown::{COOLDOWN_WINDOW_MS, RejectionLedger};
pub use engine::{
    AcceptOutcome, ConnectOutcome, DequeueOutcome, DisconnectOutcome, EndOutcome, EnqueueOutcome,
    Engine, PresenceChange, SweepOutcome,
};
pub use error::{EngineError, ErrorClass};
pub use session::MAX_MESSAGE_LEN;
