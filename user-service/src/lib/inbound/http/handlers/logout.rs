use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::session::models::RefreshSecret;
use crate::inbound::http::router::AppState;

pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<LogoutRequest>,
) -> Result<ApiSuccess<LogoutResponseData>, ApiError> {
    state
        .session_service
        .logout(RefreshSecret::new(body.refresh_token))
        .await
        .map_err(ApiError::from)
        .map(|revoked| ApiSuccess::new(StatusCode::OK, LogoutResponseData { revoked }))
}

#[derive(Clone, Deserialize)]
pub struct LogoutRequest {
    refresh_token: String,
}

/// `revoked` is informational: false means the token was unknown or already dead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoutResponseData {
    pub revoked: bool,
}
