use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared across ember-api (REST middleware), ember-server
/// (WebSocket upgrade auth) and session issuance. Canonical definition lives
/// here in ember-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub nickname: String,
    pub exp: usize,
}

// -- Session --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionRequest {
    pub nickname: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub nickname: String,
    pub token: String,
}

// -- Reports --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileReportRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct FileReportResponse {
    pub report_id: Uuid,
}
