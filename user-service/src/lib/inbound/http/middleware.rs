use axum::extract::Request;
use axum::extract::State;
use axum::http::{self};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;

use crate::domain::user::models::Role;
use crate::domain::user::models::UserId;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;

/// Extension type to store the authenticated caller in request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub role: Role,
}

/// Middleware that validates access tokens and adds the caller to request extensions
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(&req)?;

    let claims = state.token_issuer.decode_access_token(token).map_err(|e| {
        tracing::warn!(error = %e, "Access token validation failed");
        unauthorized("Invalid or expired token")
    })?;

    let user_id = claims
        .sub
        .as_deref()
        .ok_or_else(|| {
            tracing::error!("Missing 'sub' claim in token");
            unauthorized("Invalid token format")
        })
        .and_then(|sub| {
            UserId::from_string(sub).map_err(|e| {
                tracing::error!(error = %e, "Failed to parse user ID from token");
                unauthorized("Invalid token format")
            })
        })?;

    let role = claims
        .extra_str("role")
        .and_then(|role| role.parse::<Role>().ok())
        .ok_or_else(|| {
            tracing::error!(user_id = %user_id, "Missing or unknown 'role' claim in token");
            unauthorized("Invalid token format")
        })?;

    req.extensions_mut()
        .insert(AuthenticatedUser { user_id, role });

    Ok(next.run(req).await)
}

fn unauthorized(message: &str) -> Response {
    ApiError::Unauthorized(message.to_string()).into_response()
}

fn extract_token_from_header(req: &Request) -> Result<&str, Response> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header"))?;

    auth_str.strip_prefix("Bearer ").ok_or_else(|| {
        unauthorized("Invalid Authorization header format. Expected: Bearer <token>")
    })
}
