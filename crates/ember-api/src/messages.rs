use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use ember_types::api::Claims;
use ember_types::models::Message;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Keyset cursor — pass the `created_at` of the oldest message from the
    /// previous page to fetch older messages.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

/// Message history for a match, oldest first. Only the two participants may
/// read it; the transcript outlives the match (it stops streaming, it does
/// not disappear).
pub async fn get_messages(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let m = state
        .engine
        .match_snapshot(match_id)
        .ok_or(StatusCode::NOT_FOUND)?;
    if !m.contains(claims.sub) {
        return Err(StatusCode::FORBIDDEN);
    }

    // Run blocking DB queries off the async runtime
    let db = state.db.clone();
    let mid = match_id.to_string();
    let limit = query.limit.min(200);
    let before = query.before;

    let rows = tokio::task::spawn_blocking(move || db.get_messages(&mid, limit, before.as_deref()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let messages: Vec<Message> = rows
        .into_iter()
        .map(|row| Message {
            id: row.id.parse().unwrap_or_else(|e| {
                warn!("Corrupt message id '{}': {}", row.id, e);
                Uuid::default()
            }),
            match_id: row.match_id.parse().unwrap_or_else(|e| {
                warn!("Corrupt match_id '{}' on message '{}': {}", row.match_id, row.id, e);
                Uuid::default()
            }),
            sender_id: row.sender_id.parse().unwrap_or_else(|e| {
                warn!("Corrupt sender_id '{}' on message '{}': {}", row.sender_id, row.id, e);
                Uuid::default()
            }),
            sender_nickname: row.sender_nickname,
            text: row.text,
            created_at: row
                .created_at
                .parse::<chrono::DateTime<chrono::Utc>>()
                .unwrap_or_else(|e| {
                    warn!("Corrupt created_at '{}' on message '{}': {}", row.created_at, row.id, e);
                    chrono::DateTime::default()
                }),
        })
        .collect();

    Ok(Json(messages))
}
