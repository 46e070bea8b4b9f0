use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::session::errors::SessionError;
use crate::domain::session::errors::StoreError;
use crate::domain::session::models::AuthSession;
use crate::domain::session::models::LoginCommand;
use crate::domain::session::models::RefreshSecret;
use crate::domain::session::models::RefreshToken;
use crate::domain::session::models::RegisterCommand;
use crate::domain::session::models::Registration;
use crate::domain::user::models::UserId;

/// Port for the credential and token lifecycle.
#[async_trait]
pub trait SessionServicePort: Send + Sync + 'static {
    /// Create a user account.
    ///
    /// # Arguments
    /// * `command` - Validated email, names, and plaintext password
    ///
    /// # Returns
    /// Registration with the new identity, and a session when configured
    ///
    /// # Errors
    /// * `Validation` - Password is empty
    /// * `DuplicateEmail` - Email is already registered
    /// * `DatabaseError` - Persistence failed
    async fn register(&self, command: RegisterCommand) -> Result<Registration, SessionError>;

    /// Verify credentials and open a session.
    ///
    /// # Arguments
    /// * `command` - Raw email and password
    ///
    /// # Returns
    /// Access token, refresh secret, and identity
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email, wrong password, or inactive user
    /// * `DatabaseError` - Persistence failed
    async fn login(&self, command: LoginCommand) -> Result<AuthSession, SessionError>;

    /// Exchange a live refresh secret for new tokens, killing the old secret.
    ///
    /// # Arguments
    /// * `secret` - Refresh secret issued by login or a previous refresh
    ///
    /// # Returns
    /// New access token, new refresh secret, and identity
    ///
    /// # Errors
    /// * `InvalidRefreshToken` - Unknown, expired, revoked, or lost a concurrent rotation
    /// * `UserNotFound` - Owning user no longer exists; the token is revoked
    /// * `DatabaseError` - Persistence failed
    async fn refresh(&self, secret: RefreshSecret) -> Result<AuthSession, SessionError>;

    /// Revoke a refresh secret.
    ///
    /// # Arguments
    /// * `secret` - Refresh secret to revoke
    ///
    /// # Returns
    /// True if a live token was revoked, false if it was unknown or already dead
    ///
    /// # Errors
    /// * `Validation` - Secret is blank
    /// * `DatabaseError` - Persistence failed
    async fn logout(&self, secret: RefreshSecret) -> Result<bool, SessionError>;
}

/// Durable bookkeeping of refresh tokens with single-use guarantees.
///
/// Every operation takes the current instant so that expiry is judged
/// against one clock reading per request.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync + 'static {
    /// Insert a new live record.
    ///
    /// # Errors
    /// * `Conflict` - A record with the same secret exists
    /// * `DatabaseError` - Database operation failed
    async fn add(&self, token: RefreshToken) -> Result<(), StoreError>;

    /// Retrieve a record only if it is live at `now`.
    ///
    /// # Errors
    /// * `NotFound` - Secret is unknown
    /// * `Expired` - Record exists but is past expiry
    /// * `AlreadyRevoked` - Record was revoked or rotated
    /// * `DatabaseError` - Database operation failed
    async fn find_live(
        &self,
        secret: &RefreshSecret,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, StoreError>;

    /// Atomically revoke `old`, link it to `successor`, and insert `successor`.
    ///
    /// Of any number of concurrent calls for the same `old` secret, at most
    /// one succeeds. On error nothing is changed.
    ///
    /// # Errors
    /// * `NotFound` - Old secret is unknown
    /// * `Expired` - Old record is past expiry
    /// * `AlreadyRevoked` - Old record is dead (including a lost race)
    /// * `Conflict` - Successor secret already exists
    /// * `DatabaseError` - Database operation failed
    async fn rotate(
        &self,
        old: &RefreshSecret,
        successor: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Revoke a record without a successor.
    ///
    /// # Returns
    /// True if a live record was revoked, false if it was already dead
    ///
    /// # Errors
    /// * `NotFound` - Secret is unknown
    /// * `DatabaseError` - Database operation failed
    async fn revoke(&self, secret: &RefreshSecret, now: DateTime<Utc>)
        -> Result<bool, StoreError>;

    /// Revoke every live record owned by `user_id`.
    ///
    /// # Returns
    /// Number of records revoked
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn revoke_all_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}
