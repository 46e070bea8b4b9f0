use std::sync::Arc;

use async_trait::async_trait;
use auth::CredentialVerifier;
use auth::PasswordError;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::session::errors::SessionError;
use crate::domain::session::errors::StoreError;
use crate::domain::session::issuer::TokenIssuer;
use crate::domain::session::models::AuthSession;
use crate::domain::session::models::LoginCommand;
use crate::domain::session::models::RefreshSecret;
use crate::domain::session::models::RefreshToken;
use crate::domain::session::models::RegisterCommand;
use crate::domain::session::models::Registration;
use crate::domain::session::models::SessionSettings;
use crate::domain::session::ports::RefreshTokenStore;
use crate::domain::session::ports::SessionServicePort;
use crate::domain::user::errors::UserError;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::PasswordHash;
use crate::domain::user::models::Role;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::UserDirectory;

/// Domain service implementation for the session lifecycle.
///
/// Composes the user directory, the refresh token store, the token issuer,
/// and the credential verifier. Holds no mutable state of its own.
pub struct SessionService<UD, RS>
where
    UD: UserDirectory,
    RS: RefreshTokenStore,
{
    directory: Arc<UD>,
    store: Arc<RS>,
    issuer: Arc<TokenIssuer>,
    verifier: Arc<CredentialVerifier>,
    settings: SessionSettings,
}

impl<UD, RS> SessionService<UD, RS>
where
    UD: UserDirectory,
    RS: RefreshTokenStore,
{
    /// Create a new session service with injected dependencies.
    ///
    /// # Arguments
    /// * `directory` - User lookup and persistence
    /// * `store` - Refresh token persistence
    /// * `issuer` - Access token and refresh secret minting
    /// * `settings` - Refresh lifetime and lifecycle policies
    ///
    /// # Returns
    /// Configured session service instance
    pub fn new(
        directory: Arc<UD>,
        store: Arc<RS>,
        issuer: Arc<TokenIssuer>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            directory,
            store,
            issuer,
            verifier: Arc::new(CredentialVerifier::new()),
            settings,
        }
    }

    /// Hash on the blocking pool so Argon2 does not stall other requests.
    async fn hash_password(&self, password: String) -> Result<PasswordHash, SessionError> {
        let verifier = Arc::clone(&self.verifier);

        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| SessionError::Unknown(format!("Password hashing task failed: {}", e)))?
            .map(PasswordHash::new)
            .map_err(|e| match e {
                PasswordError::EmptyPassword => SessionError::Validation(e.to_string()),
                _ => SessionError::Unknown(format!("Password hashing failed: {}", e)),
            })
    }

    /// Check `password` against the user's hash, or against the decoy hash
    /// when there is no user, so both paths cost the same.
    async fn verify_password(
        &self,
        password: String,
        user: Option<&User>,
    ) -> Result<bool, SessionError> {
        let verifier = Arc::clone(&self.verifier);
        let stored_hash = user.map(|u| u.password_hash.as_str().to_string());

        let outcome = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => verifier.verify(&password, &hash),
            None => Ok(verifier.verify_decoy(&password)),
        })
        .await
        .map_err(|e| {
            SessionError::Unknown(format!("Password verification task failed: {}", e))
        })?;

        match outcome {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::error!(error = %e, "Stored password hash could not be parsed");
                Ok(false)
            }
        }
    }

    /// Mint an access token and a refresh record for `user` and persist the record.
    async fn open_session(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<AuthSession, SessionError> {
        let access_token = self.issuer.issue_access_token(user, now)?;
        let secret = self.issuer.issue_refresh_secret()?;

        let record = RefreshToken::issue(
            secret.clone(),
            user.id,
            now,
            self.settings.refresh_token_ttl(),
        );
        self.store.add(record).await.map_err(store_error)?;

        Ok(AuthSession {
            access_token,
            refresh_token: secret,
            identity: user.identity(),
        })
    }

    async fn apply_reuse_policy(&self, user_id: &UserId, now: DateTime<Utc>) {
        if !self.settings.revoke_family_on_reuse() {
            return;
        }

        match self.store.revoke_all_for_user(user_id, now).await {
            Ok(revoked) => tracing::warn!(
                user_id = %user_id,
                revoked,
                "Revoked all refresh tokens after reuse of a revoked token"
            ),
            Err(e) => tracing::error!(
                user_id = %user_id,
                error = %e,
                "Failed to revoke refresh tokens after reuse"
            ),
        }
    }
}

#[async_trait]
impl<UD, RS> SessionServicePort for SessionService<UD, RS>
where
    UD: UserDirectory,
    RS: RefreshTokenStore,
{
    async fn register(&self, command: RegisterCommand) -> Result<Registration, SessionError> {
        if command.password.is_empty() {
            return Err(SessionError::Validation(
                "Password must not be empty".to_string(),
            ));
        }

        let existing = self
            .directory
            .find_by_email(&command.email)
            .await
            .map_err(user_error)?;
        if existing.is_some() {
            tracing::info!(email = %command.email, "Registration rejected, email already exists");
            return Err(SessionError::DuplicateEmail);
        }

        let password_hash = self.hash_password(command.password).await?;
        let now = Utc::now();

        let user = User {
            id: UserId::new(),
            email: command.email,
            password_hash,
            first_name: command.first_name,
            last_name: command.last_name,
            role: Role::default(),
            created_at: now,
            updated_at: None,
            is_active: true,
        };

        let created_user = self.directory.create(user).await.map_err(user_error)?;
        tracing::info!(user_id = %created_user.id, "User registered");

        let session = if self.settings.issue_tokens_on_register() {
            Some(self.open_session(&created_user, now).await?)
        } else {
            None
        };

        Ok(Registration {
            identity: created_user.identity(),
            session,
        })
    }

    async fn login(&self, command: LoginCommand) -> Result<AuthSession, SessionError> {
        let user = match EmailAddress::new(command.email.clone()) {
            Ok(email) => self
                .directory
                .find_by_email(&email)
                .await
                .map_err(user_error)?,
            Err(_) => None,
        };

        let verified = self.verify_password(command.password, user.as_ref()).await?;

        let user = match user {
            Some(user) if verified && user.is_active => user,
            _ => {
                tracing::warn!(email = %command.email, "Invalid login attempt");
                return Err(SessionError::InvalidCredentials);
            }
        };

        let session = self.open_session(&user, Utc::now()).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(session)
    }

    async fn refresh(&self, secret: RefreshSecret) -> Result<AuthSession, SessionError> {
        if secret.as_str().trim().is_empty() {
            return Err(SessionError::InvalidRefreshToken);
        }

        let now = Utc::now();

        let record = match self.store.find_live(&secret, now).await {
            Ok(record) => record,
            Err(StoreError::AlreadyRevoked { user_id }) => {
                tracing::warn!(user_id = %user_id, "Reuse of revoked refresh token");
                self.apply_reuse_policy(&user_id, now).await;
                return Err(SessionError::InvalidRefreshToken);
            }
            Err(StoreError::Expired) => {
                tracing::info!("Refresh attempted with expired token");
                return Err(SessionError::InvalidRefreshToken);
            }
            Err(StoreError::NotFound) => {
                tracing::info!("Refresh attempted with unknown token");
                return Err(SessionError::InvalidRefreshToken);
            }
            Err(e) => return Err(store_error(e)),
        };

        let user = match self
            .directory
            .find_by_id(&record.user_id)
            .await
            .map_err(user_error)?
        {
            Some(user) if user.is_active => user,
            _ => {
                tracing::warn!(
                    user_id = %record.user_id,
                    "Refresh token owner missing or inactive, revoking token"
                );
                if let Err(e) = self.store.revoke(&secret, now).await {
                    tracing::error!(error = %e, "Failed to revoke orphaned refresh token");
                }
                return Err(SessionError::UserNotFound);
            }
        };

        let access_token = self.issuer.issue_access_token(&user, now)?;
        let new_secret = self.issuer.issue_refresh_secret()?;
        let successor = RefreshToken::issue(
            new_secret.clone(),
            user.id,
            now,
            self.settings.refresh_token_ttl(),
        );

        match self.store.rotate(&secret, successor, now).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "Refresh token rotated");
                Ok(AuthSession {
                    access_token,
                    refresh_token: new_secret,
                    identity: user.identity(),
                })
            }
            Err(StoreError::AlreadyRevoked { .. } | StoreError::Expired | StoreError::NotFound) => {
                // Tokens minted above are dropped unused.
                tracing::warn!(
                    user_id = %user.id,
                    "Refresh token rotation lost to a concurrent request"
                );
                Err(SessionError::InvalidRefreshToken)
            }
            Err(e) => Err(store_error(e)),
        }
    }

    async fn logout(&self, secret: RefreshSecret) -> Result<bool, SessionError> {
        if secret.as_str().trim().is_empty() {
            return Err(SessionError::Validation(
                "Refresh token is required".to_string(),
            ));
        }

        match self.store.revoke(&secret, Utc::now()).await {
            Ok(true) => {
                tracing::info!("Logged out, refresh token revoked");
                Ok(true)
            }
            Ok(false) => {
                tracing::info!("Logout with refresh token that was already dead");
                Ok(false)
            }
            Err(StoreError::NotFound) => {
                tracing::warn!("Attempted logout with unknown refresh token");
                Ok(false)
            }
            Err(e) => Err(store_error(e)),
        }
    }
}

fn store_error(err: StoreError) -> SessionError {
    match err {
        StoreError::NotFound | StoreError::Expired | StoreError::AlreadyRevoked { .. } => {
            SessionError::InvalidRefreshToken
        }
        StoreError::Conflict => SessionError::Conflict(err.to_string()),
        StoreError::DatabaseError(msg) => SessionError::DatabaseError(msg),
    }
}

fn user_error(err: UserError) -> SessionError {
    match err {
        UserError::EmailAlreadyExists(_) => SessionError::DuplicateEmail,
        UserError::NotFound(_) => SessionError::UserNotFound,
        UserError::DatabaseError(msg) => SessionError::DatabaseError(msg),
        UserError::InvalidUserId(_)
        | UserError::InvalidEmail(_)
        | UserError::InvalidName(_)
        | UserError::InvalidRole(_)
        | UserError::Unknown(_) => SessionError::Unknown(err.to_string()),
    }
}
