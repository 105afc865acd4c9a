use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use ember_api::middleware::require_auth;
use ember_api::{AppState, AppStateInner, messages, reports, session};
use ember_core::Engine;
use ember_db::Database;
use ember_gateway::connection;
use ember_gateway::dispatcher::Dispatcher;
use ember_types::events::GatewayEvent;

/// Interval for the maintenance sweep: evict expired cooldown entries, then
/// pair any waiting users the expiry unblocked.
const SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    engine: Engine,
    db: Arc<Database>,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ember=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("EMBER_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("EMBER_DB_PATH").unwrap_or_else(|_| "ember.db".into());
    let host = std::env::var("EMBER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("EMBER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let engine = Engine::new();
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        engine: engine.clone(),
        jwt_secret: jwt_secret.clone(),
    });

    let state = ServerState {
        dispatcher: dispatcher.clone(),
        engine: engine.clone(),
        db,
        jwt_secret,
    };

    // Background maintenance
    tokio::spawn(run_sweep_loop(engine, dispatcher, SWEEP_INTERVAL_SECS));

    // Routes
    let public_routes = Router::new()
        .route("/session", post(session::create_session))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/matches/{match_id}/messages", get(messages::get_messages))
        .route("/matches/{match_id}/reports", post(reports::file_report))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Ember server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: String,
}

/// Validate the JWT at the HTTP upgrade layer so the socket loop starts
/// pre-authenticated.
async fn ws_upgrade(
    State(state): State<ServerState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let claims =
        session::decode_token(&state.jwt_secret, &query.token).ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection_authenticated(
            socket,
            state.dispatcher,
            state.engine,
            state.db,
            claims.sub,
            claims.nickname,
        )
    }))
}

/// Background task that keeps the cooldown ledger bounded and picks up
/// pairings that were blocked only by a now-expired cooldown.
async fn run_sweep_loop(engine: Engine, dispatcher: Dispatcher, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let out = engine.sweep();
        if out.pruned > 0 {
            info!("Sweep: evicted {} expired cooldown entries", out.pruned);
        }
        for m in out.paired {
            info!("Sweep: paired match {}", m.id);
            dispatcher
                .send_to_users(&m.users, GatewayEvent::MatchFound(m.clone()))
                .await;
        }
    }
}
