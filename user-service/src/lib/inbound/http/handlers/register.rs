use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use super::ApiError;
use super::ApiSuccess;
use super::IdentityData;
use crate::domain::session::models::RegisterCommand;
use crate::domain::session::models::Registration;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::PersonName;
use crate::inbound::http::router::AppState;
use crate::user::errors::EmailError;
use crate::user::errors::NameError;

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<ApiSuccess<RegisterResponseData>, ApiError> {
    let expires_in = state.token_issuer.access_token_ttl().num_seconds();

    state
        .session_service
        .register(body.try_into_command()?)
        .await
        .map_err(ApiError::from)
        .map(|registration| {
            ApiSuccess::new(
                StatusCode::CREATED,
                RegisterResponseData::new(registration, expires_in),
            )
        })
}

/// HTTP request body for registering a user (raw JSON)
#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
}

#[derive(Debug, Clone, Error)]
enum ParseRegisterRequestError {
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("Invalid name: {0}")]
    Name(#[from] NameError),
}

impl RegisterRequest {
    fn try_into_command(self) -> Result<RegisterCommand, ParseRegisterRequestError> {
        let email = EmailAddress::new(self.email)?;
        let first_name = PersonName::new(self.first_name)?;
        let last_name = PersonName::new(self.last_name)?;
        Ok(RegisterCommand::new(
            email,
            self.password,
            first_name,
            last_name,
        ))
    }
}

impl From<ParseRegisterRequestError> for ApiError {
    fn from(err: ParseRegisterRequestError) -> Self {
        ApiError::UnprocessableEntity(err.to_string())
    }
}

/// Created identity, plus tokens when registration opens a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterResponseData {
    pub user: IdentityData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl RegisterResponseData {
    fn new(registration: Registration, expires_in: i64) -> Self {
        let user = IdentityData::from(&registration.identity);

        match registration.session {
            Some(session) => Self {
                user,
                access_token: Some(session.access_token.token),
                token_type: Some("Bearer".to_string()),
                expires_in: Some(expires_in),
                refresh_token: Some(session.refresh_token.into_inner()),
            },
            None => Self {
                user,
                access_token: None,
                token_type: None,
                expires_in: None,
                refresh_token: None,
            },
        }
    }
}
