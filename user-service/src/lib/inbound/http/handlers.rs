use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use crate::domain::session::errors::SessionError;
use crate::domain::session::models::AuthSession;
use crate::domain::user::models::Identity;
use crate::user::errors::UserError;

pub mod get_profile;
pub mod login;
pub mod logout;
pub mod refresh;
pub mod register;
pub mod update_profile;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Clone)]
pub struct ApiSuccess<T: Serialize + PartialEq>(StatusCode, Json<ApiResponseBody<T>>);

impl<T> PartialEq for ApiSuccess<T>
where
    T: Serialize + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 .0 == other.1 .0
    }
}

impl<T: Serialize + PartialEq> ApiSuccess<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        ApiSuccess(status, Json(ApiResponseBody::new(status, data)))
    }
}

impl<T: Serialize + PartialEq> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    InternalServerError(String),
    UnprocessableEntity(String),
    NotFound(String),
    Conflict(String),
    Unauthorized(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::UnprocessableEntity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
        };

        (status, Json(ApiResponseBody::new_error(status, message))).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Validation(_) => ApiError::UnprocessableEntity(err.to_string()),
            SessionError::DuplicateEmail | SessionError::Conflict(_) => {
                ApiError::Conflict(err.to_string())
            }
            SessionError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            // An orphaned refresh token reads the same as any other dead one.
            SessionError::InvalidRefreshToken | SessionError::UserNotFound => {
                ApiError::Unauthorized("Invalid refresh token".to_string())
            }
            SessionError::Configuration(_)
            | SessionError::DatabaseError(_)
            | SessionError::Unknown(_) => {
                tracing::error!(error = %err, "Session operation failed");
                ApiError::InternalServerError(INTERNAL_ERROR_MESSAGE.to_string())
            }
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(_) => ApiError::NotFound(err.to_string()),
            UserError::EmailAlreadyExists(_) => ApiError::Conflict(err.to_string()),
            UserError::InvalidUserId(_)
            | UserError::InvalidEmail(_)
            | UserError::InvalidName(_)
            | UserError::InvalidRole(_) => ApiError::UnprocessableEntity(err.to_string()),
            UserError::DatabaseError(_) | UserError::Unknown(_) => {
                tracing::error!(error = %err, "User operation failed");
                ApiError::InternalServerError(INTERNAL_ERROR_MESSAGE.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponseBody<T: Serialize + PartialEq> {
    status_code: u16,
    data: T,
}

impl<T: Serialize + PartialEq> ApiResponseBody<T> {
    pub fn new(status_code: StatusCode, data: T) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data,
        }
    }
}

impl ApiResponseBody<ApiErrorData> {
    pub fn new_error(status_code: StatusCode, message: String) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data: ApiErrorData { message },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorData {
    pub message: String,
}

/// Public identity as returned over HTTP. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityData {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for IdentityData {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.to_string(),
            email: identity.email.as_str().to_string(),
            first_name: identity.first_name.as_str().to_string(),
            last_name: identity.last_name.as_str().to_string(),
            role: identity.role.as_str().to_string(),
            created_at: identity.created_at,
        }
    }
}

/// Token pair returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionData {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub user: IdentityData,
}

impl SessionData {
    pub fn new(session: AuthSession, expires_in: i64) -> Self {
        Self {
            user: (&session.identity).into(),
            access_token: session.access_token.token,
            token_type: "Bearer".to_string(),
            expires_in,
            refresh_token: session.refresh_token.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_failures_share_one_message() {
        let invalid = ApiError::from(SessionError::InvalidRefreshToken);
        let orphaned = ApiError::from(SessionError::UserNotFound);
        assert_eq!(invalid, orphaned);
        assert_eq!(
            invalid,
            ApiError::Unauthorized("Invalid refresh token".to_string())
        );
    }

    #[test]
    fn test_infrastructure_errors_are_not_leaked() {
        let err = ApiError::from(SessionError::DatabaseError(
            "password authentication failed for user postgres".to_string(),
        ));
        assert_eq!(
            err,
            ApiError::InternalServerError(INTERNAL_ERROR_MESSAGE.to_string())
        );
    }

    #[test]
    fn test_validation_maps_to_unprocessable_entity() {
        let err = ApiError::from(SessionError::Validation("Password must not be empty".into()));
        assert!(matches!(err, ApiError::UnprocessableEntity(_)));
        assert_eq!(
            err.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
