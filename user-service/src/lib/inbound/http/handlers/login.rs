use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::SessionData;
use crate::domain::session::models::LoginCommand;
use crate::inbound::http::router::AppState;

/// Email is passed through unparsed so a malformed address fails the same
/// way as an unknown one.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<ApiSuccess<SessionData>, ApiError> {
    let expires_in = state.token_issuer.access_token_ttl().num_seconds();

    let command = LoginCommand {
        email: body.email,
        password: body.password,
    };

    state
        .session_service
        .login(command)
        .await
        .map_err(ApiError::from)
        .map(|session| ApiSuccess::new(StatusCode::OK, SessionData::new(session, expires_in)))
}

#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}
