use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::SessionData;
use crate::domain::session::models::RefreshSecret;
use crate::inbound::http::router::AppState;

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<ApiSuccess<SessionData>, ApiError> {
    let expires_in = state.token_issuer.access_token_ttl().num_seconds();

    state
        .session_service
        .refresh(RefreshSecret::new(body.refresh_token))
        .await
        .map_err(ApiError::from)
        .map(|session| ApiSuccess::new(StatusCode::OK, SessionData::new(session, expires_in)))
}

#[derive(Clone, Deserialize)]
pub struct RefreshRequest {
    refresh_token: String,
}
