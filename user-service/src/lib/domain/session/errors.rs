use chrono::DateTime;
use chrono::Utc;
use thiserror::Error;

use crate::domain::session::models::RefreshToken;
use crate::domain::session::models::TokenStatus;
use crate::domain::user::models::UserId;

/// Error for refresh token store operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Refresh token not found")]
    NotFound,

    #[error("Refresh token expired")]
    Expired,

    /// The token was revoked or rotated earlier. Carries the owner so the
    /// caller can apply its reuse policy.
    #[error("Refresh token already revoked (user {user_id})")]
    AlreadyRevoked { user_id: UserId },

    #[error("Refresh token secret already exists")]
    Conflict,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl StoreError {
    /// Why `record` cannot be used at `now`.
    pub fn dead(record: &RefreshToken, now: DateTime<Utc>) -> Self {
        match record.status(now) {
            TokenStatus::Rotated | TokenStatus::Revoked => StoreError::AlreadyRevoked {
                user_id: record.user_id,
            },
            TokenStatus::Expired | TokenStatus::Live => StoreError::Expired,
        }
    }
}

/// Top-level error for register, login, refresh, and logout.
///
/// Credential and refresh failures are deliberately coarse: the variant
/// never tells the caller which part of the check failed.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Infrastructure errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
