use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use ember_core::{Engine, EngineError, ErrorClass};
use ember_db::Database;
use ember_types::events::{GatewayCommand, GatewayEvent};
use ember_types::models::MatchStatus;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Delay before a rejecter is put back into the queue. UX policy, not a
/// correctness requirement.
const REQUEUE_DELAY: Duration = Duration::from_secs(3);

/// Handle a pre-authenticated WebSocket connection. The JWT was already
/// validated at the HTTP upgrade layer, so we go straight to Ready + event
/// loop.
pub async fn handle_connection_authenticated(
    socket: WebSocket,
    dispatcher: Dispatcher,
    engine: Engine,
    db: Arc<Database>,
    user_id: Uuid,
    nickname: String,
) {
    let (mut sender, receiver) = socket.split();

    info!("{} ({}) connected to gateway", nickname, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        nickname: nickname.clone(),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    run_connection_loop(sender, receiver, dispatcher, engine, db, user_id, nickname).await;
}

async fn run_connection_loop(
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut receiver: futures_util::stream::SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    engine: Engine,
    db: Arc<Database>,
    user_id: Uuid,
    nickname: String,
) {
    let (conn_id, mut user_rx) = dispatcher.register_user_channel(user_id).await;

    // Publish this user and fetch the state a joining client needs: who is
    // already here, and any match that survived a reconnect.
    let connect = engine.connect(user_id, &nickname);

    for user in &connect.roster {
        let event = GatewayEvent::PresenceUpdate {
            user_id: user.id,
            nickname: user.nickname.clone(),
            status: user.status,
        };
        if send_event(&mut sender, &event).await.is_err() {
            return;
        }
    }

    if let Some(m) = &connect.current {
        let event = match m.status {
            MatchStatus::Active => GatewayEvent::MatchStarted(m.clone()),
            _ => GatewayEvent::MatchFound(m.clone()),
        };
        if send_event(&mut sender, &event).await.is_err() {
            return;
        }
    }

    // Now announce ourselves to everyone else.
    dispatcher.broadcast(GatewayEvent::PresenceUpdate {
        user_id: connect.presence.user_id,
        nickname: connect.presence.nickname.clone(),
        status: connect.presence.status,
    });

    let mut broadcast_rx = dispatcher.subscribe();
    let dispatcher_clone = dispatcher.clone();
    let engine_clone = engine.clone();

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let nickname_recv = nickname.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&engine_clone, &dispatcher_clone, &db, user_id, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            nickname_recv,
                            user_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // The disconnect hook: runs on every teardown path (close, error,
    // heartbeat timeout), guarded so a stale connection never clobbers a
    // newer one for the same user.
    if dispatcher.release_user_channel(user_id, conn_id).await {
        let out = engine.disconnect(user_id);
        if let Some(p) = out.presence {
            dispatcher.broadcast(GatewayEvent::PresenceUpdate {
                user_id: p.user_id,
                nickname: p.nickname,
                status: p.status,
            });
        }
    }

    info!("{} ({}) disconnected from gateway", nickname, user_id);
}

async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).unwrap();
    sender.send(Message::Text(text.into())).await
}

async fn handle_command(
    engine: &Engine,
    dispatcher: &Dispatcher,
    db: &Arc<Database>,
    user_id: Uuid,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::EnterQueue => {
            enter_queue(engine, dispatcher, user_id).await;
        }

        GatewayCommand::ExitQueue => {
            let out = engine.dequeue(user_id);
            if out.removed {
                dispatcher
                    .send_to_user(user_id, GatewayEvent::QueueExited { user_id })
                    .await;
            }
            broadcast_presence(dispatcher, out.presence.into_iter().collect());
        }

        GatewayCommand::Accept => match engine.accept(user_id) {
            Ok(out) => {
                dispatcher
                    .send_to_users(&out.updated.users, GatewayEvent::MatchUpdate(out.updated.clone()))
                    .await;
                if out.activated {
                    dispatcher
                        .send_to_users(
                            &out.updated.users,
                            GatewayEvent::MatchStarted(out.updated.clone()),
                        )
                        .await;
                    broadcast_presence(dispatcher, out.presence);
                }
            }
            Err(e) => log_engine_error("accept", user_id, &e),
        },

        GatewayCommand::Reject => match engine.reject(user_id) {
            Ok(out) => {
                dispatcher
                    .send_to_users(&out.ended.users, GatewayEvent::MatchEnded(out.ended.clone()))
                    .await;
                broadcast_presence(dispatcher, out.presence);

                // UX policy: the rejecter goes back to searching shortly.
                let engine = engine.clone();
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(REQUEUE_DELAY).await;
                    enter_queue(&engine, &dispatcher, user_id).await;
                });
            }
            Err(e) => log_engine_error("reject", user_id, &e),
        },

        GatewayCommand::Leave => {
            finish_match(dispatcher, engine.leave(user_id), user_id, "leave").await;
        }

        GatewayCommand::ForceEnd => {
            finish_match(dispatcher, engine.force_end(user_id), user_id, "force_end").await;
        }

        GatewayCommand::SendChat { text } => match engine.send_message(user_id, &text) {
            Ok(message) => {
                let db = db.clone();
                let to_persist = message.clone();
                let persisted =
                    tokio::task::spawn_blocking(move || db.insert_message(&to_persist)).await;

                match persisted {
                    Ok(Ok(())) => {
                        if let Some(m) = engine.match_snapshot(message.match_id) {
                            dispatcher
                                .send_to_users(&m.users, GatewayEvent::MessageCreate(message))
                                .await;
                        }
                    }
                    Ok(Err(e)) => {
                        // Store failure: logged, nothing delivered, no state
                        // advanced past what committed.
                        warn!("message persist failed for {}: {}", user_id, e);
                    }
                    Err(e) => {
                        warn!("spawn_blocking join error: {}", e);
                    }
                }
            }
            Err(e) => {
                log_engine_error("send", user_id, &e);
                dispatcher
                    .send_to_user(
                        user_id,
                        GatewayEvent::SendRejected {
                            reason: e.to_string(),
                        },
                    )
                    .await;
            }
        },

        GatewayCommand::Report { reason } => match engine.build_report(user_id, None, &reason) {
            Ok(report) => {
                let db = db.clone();
                let to_persist = report.clone();
                let persisted =
                    tokio::task::spawn_blocking(move || db.insert_report(&to_persist)).await;
                match persisted {
                    Ok(Ok(())) => {
                        info!(
                            "report {} filed by {} against {} (match {})",
                            report.id, report.reporter_id, report.reported_id, report.match_id
                        );
                    }
                    Ok(Err(e)) => warn!("report persist failed for {}: {}", user_id, e),
                    Err(e) => warn!("spawn_blocking join error: {}", e),
                }
            }
            Err(e) => log_engine_error("report", user_id, &e),
        },
    }
}

async fn enter_queue(engine: &Engine, dispatcher: &Dispatcher, user_id: Uuid) {
    match engine.enqueue(user_id) {
        Ok(out) => {
            dispatcher
                .send_to_user(user_id, GatewayEvent::QueueEntered { user_id })
                .await;
            broadcast_presence(dispatcher, out.presence.into_iter().collect());
            if let Some(m) = out.paired {
                dispatcher
                    .send_to_users(&m.users, GatewayEvent::MatchFound(m.clone()))
                    .await;
            }
        }
        Err(e) => log_engine_error("enqueue", user_id, &e),
    }
}

async fn finish_match(
    dispatcher: &Dispatcher,
    result: Result<ember_core::EndOutcome, EngineError>,
    user_id: Uuid,
    op: &str,
) {
    match result {
        Ok(out) => {
            dispatcher
                .send_to_users(&out.ended.users, GatewayEvent::MatchEnded(out.ended.clone()))
                .await;
            broadcast_presence(dispatcher, out.presence);
        }
        Err(e) => log_engine_error(op, user_id, &e),
    }
}

fn broadcast_presence(dispatcher: &Dispatcher, changes: Vec<ember_core::PresenceChange>) {
    for p in changes {
        dispatcher.broadcast(GatewayEvent::PresenceUpdate {
            user_id: p.user_id,
            nickname: p.nickname,
            status: p.status,
        });
    }
}

/// Engine failures are never fatal to the connection: validation misuse is
/// worth a warn, lost races and vanished records just get debug traces and
/// the client state settles on the next event.
fn log_engine_error(op: &str, user_id: Uuid, err: &EngineError) {
    match err.class() {
        ErrorClass::Validation => warn!("{} rejected for {}: {}", op, user_id, err),
        ErrorClass::Conflict => debug!("{} conflicted for {}: {}", op, user_id, err),
        ErrorClass::MissingRecord => {
            debug!("{} for {}: no record, treated as already ended", op, user_id);
        }
    }
}
