use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::info;
use uuid::Uuid;

use ember_types::api::{Claims, SessionRequest, SessionResponse};

use crate::AppState;

/// Nickname bounds, counted after trimming.
const MAX_NICKNAME_LEN: usize = 20;

/// Anonymous session issuance: the identity boundary of the system. Mints a
/// fresh opaque user id and a token binding it to the chosen nickname. No
/// password, no account — the id only needs to be stable for the session.
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let nickname = req.nickname.trim();
    if nickname.is_empty() || nickname.chars().count() > MAX_NICKNAME_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let user_id = Uuid::new_v4();
    let token = create_token(&state.jwt_secret, user_id, nickname)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    info!("session issued for {} ({})", nickname, user_id);
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user_id,
            nickname: nickname.to_string(),
            token,
        }),
    ))
}

pub fn create_token(secret: &str, user_id: Uuid, nickname: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        nickname: nickname.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate a token and return its claims. Used by the WebSocket upgrade
/// layer as well as the REST middleware.
pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips() {
        let user_id = Uuid::new_v4();
        let token = create_token("test-secret", user_id, "ana").unwrap();
        let claims = decode_token("test-secret", &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.nickname, "ana");
    }

    #[test]
    fn wrong_secret_is_refused() {
        let token = create_token("test-secret", Uuid::new_v4(), "ana").unwrap();
        assert!(decode_token("other-secret", &token).is_none());
    }
}
