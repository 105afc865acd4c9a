/// Integration test: drive a full match lifecycle through the public Engine
/// API — queue in, pair, handshake, chat gate, reject, cooldown, recover.

use ember_core::{Engine, EngineError};
use ember_types::models::{MatchStatus, PresenceStatus};
use uuid::Uuid;

fn connect(engine: &Engine, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    engine.connect(id, name);
    id
}

#[test]
fn full_lifecycle_happy_path() {
    let engine = Engine::new();
    let a = connect(&engine, "Alice");
    let b = connect(&engine, "Bob");

    // Queue in: A waits, B's enqueue pairs them.
    assert!(engine.enqueue(a).unwrap().paired.is_none());
    let m = engine.enqueue(b).unwrap().paired.expect("paired");
    assert_eq!(m.status, MatchStatus::Pending);

    // Chat is gated until both accept.
    assert_eq!(
        engine.send_message(a, "too early").unwrap_err(),
        EngineError::MatchNotActive
    );

    engine.accept(a).unwrap();
    let out = engine.accept(b).unwrap();
    assert!(out.activated);
    assert_eq!(engine.presence_of(a), Some(PresenceStatus::Chatting));

    // Messages flow both ways, stamped and ordered by creation time.
    let first = engine.send_message(a, "hi").unwrap();
    let second = engine.send_message(b, "hey").unwrap();
    assert_eq!(first.match_id, m.id);
    assert_eq!(second.sender_nickname, "Bob");
    assert!(first.created_at <= second.created_at);

    // Leaving closes the session and frees both users.
    engine.leave(b).unwrap();
    assert_eq!(
        engine.send_message(a, "anyone there?").unwrap_err(),
        EngineError::NoCurrentMatch
    );
    assert_eq!(engine.presence_of(a), Some(PresenceStatus::Online));

    // No rejection was recorded, so they pair again at once.
    engine.enqueue(a).unwrap();
    assert!(engine.enqueue(b).unwrap().paired.is_some());
}

#[test]
fn rejection_cooldown_diverts_pairing_to_third_user() {
    let engine = Engine::new();
    let a = connect(&engine, "Alice");
    let b = connect(&engine, "Bob");
    let c = connect(&engine, "Cara");

    engine.enqueue(a).unwrap();
    engine.enqueue(b).unwrap();
    engine.reject(a).unwrap();

    // A and B wait inside the cooldown window; they must not re-pair.
    engine.enqueue(a).unwrap();
    engine.enqueue(b).unwrap();
    assert!(engine.sweep().paired.is_empty());
    assert_eq!(engine.queue_len(), 2);

    // C arrives and pairs with whoever queued first — the cooldown only
    // blocks the rejected pair.
    let m = engine.enqueue(c).unwrap().paired.expect("paired");
    assert!(m.contains(c));
    assert_eq!(engine.queue_len(), 1);
}

#[test]
fn report_survives_match_end() {
    let engine = Engine::new();
    let a = connect(&engine, "Alice");
    let b = connect(&engine, "Bob");
    engine.enqueue(a).unwrap();
    let m = engine.enqueue(b).unwrap().paired.unwrap();
    engine.accept(a).unwrap();
    engine.accept(b).unwrap();
    engine.leave(a).unwrap();

    // Reporting by explicit match id still works after the match ended.
    let report = engine.build_report(a, Some(m.id), "harassment").unwrap();
    assert_eq!(report.reported_id, b);
    assert_eq!(report.match_id, m.id);
}
