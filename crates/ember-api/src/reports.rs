use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use ember_core::ErrorClass;
use ember_types::api::{Claims, FileReportRequest, FileReportResponse};

use crate::AppState;

/// File a report against the other participant of a match. Plain append:
/// no dedup, no rate limiting.
pub async fn file_report(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FileReportRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let report = state
        .engine
        .build_report(claims.sub, Some(match_id), &req.reason)
        .map_err(|e| match e.class() {
            ErrorClass::Validation => StatusCode::BAD_REQUEST,
            ErrorClass::MissingRecord => StatusCode::NOT_FOUND,
            ErrorClass::Conflict => StatusCode::CONFLICT,
        })?;

    let db = state.db.clone();
    let to_persist = report.clone();
    tokio::task::spawn_blocking(move || db.insert_report(&to_persist))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    info!(
        "report {} filed by {} against {} (match {})",
        report.id, report.reporter_id, report.reported_id, report.match_id
    );

    Ok((
        StatusCode::CREATED,
        Json(FileReportResponse {
            report_id: report.id,
        }),
    ))
}
