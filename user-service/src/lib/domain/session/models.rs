use std::fmt;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::session::errors::SessionError;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Identity;
use crate::domain::user::models::PersonName;
use crate::domain::user::models::UserId;

/// Opaque refresh-token secret presented by clients.
///
/// A bearer credential: `Debug` is redacted so it never reaches logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RefreshSecret(String);

impl RefreshSecret {
    pub fn new(secret: String) -> Self {
        Self(secret)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for RefreshSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshSecret(<redacted>)")
    }
}

/// Refresh token unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefreshTokenId(pub Uuid);

impl RefreshTokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RefreshTokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RefreshTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle position of a refresh token.
///
/// `Live` is the only non-terminal state; nothing leaves a dead state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Live,
    /// Revoked by a refresh that issued a successor.
    Rotated,
    /// Revoked without a successor (logout or cascade).
    Revoked,
    /// Passed its expiry without being used.
    Expired,
}

impl TokenStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, TokenStatus::Live)
    }
}

/// Refresh token record owned by the refresh token store.
///
/// `user_id` is a reference to the owning user, not an ownership link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: RefreshTokenId,
    pub secret: RefreshSecret,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<RefreshSecret>,
}

impl RefreshToken {
    /// Create a live record for `user_id` valid for `ttl` from `now`.
    ///
    /// An expiry past the representable range saturates.
    pub fn issue(
        secret: RefreshSecret,
        user_id: UserId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: RefreshTokenId::new(),
            secret,
            user_id,
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            revoked_at: None,
            replaced_by: None,
        }
    }

    /// Status at instant `now`. Revocation takes precedence over expiry.
    pub fn status(&self, now: DateTime<Utc>) -> TokenStatus {
        match (&self.revoked_at, &self.replaced_by) {
            (Some(_), Some(_)) => TokenStatus::Rotated,
            (Some(_), None) => TokenStatus::Revoked,
            (None, _) if now >= self.expires_at => TokenStatus::Expired,
            (None, _) => TokenStatus::Live,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status(now).is_live()
    }

    /// Mark dead without a successor.
    pub fn revoke(&mut self, now: DateTime<Utc>) {
        self.revoked_at = Some(now);
    }

    /// Mark dead and link to the token that replaced it.
    pub fn rotate_to(&mut self, successor: &RefreshSecret, now: DateTime<Utc>) {
        self.revoked_at = Some(now);
        self.replaced_by = Some(successor.clone());
    }
}

/// Signed access token with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Tokens and identity returned by login and refresh.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: AccessToken,
    pub refresh_token: RefreshSecret,
    pub identity: Identity,
}

/// Result of a registration.
///
/// `session` is populated only when registration is configured to log the
/// new user in immediately.
#[derive(Debug, Clone)]
pub struct Registration {
    pub identity: Identity,
    pub session: Option<AuthSession>,
}

/// Command to register a new user with domain types
///
/// Not `Debug`: it carries the plaintext password.
pub struct RegisterCommand {
    pub email: EmailAddress,
    pub password: String,
    pub first_name: PersonName,
    pub last_name: PersonName,
}

impl RegisterCommand {
    /// Construct a new register command.
    ///
    /// # Arguments
    /// * `email` - Validated email address
    /// * `password` - Plain text password (will be hashed by service)
    /// * `first_name` - Validated first name
    /// * `last_name` - Validated last name
    pub fn new(
        email: EmailAddress,
        password: String,
        first_name: PersonName,
        last_name: PersonName,
    ) -> Self {
        Self {
            email,
            password,
            first_name,
            last_name,
        }
    }
}

/// Credentials submitted at login.
///
/// Kept as raw strings: a malformed email must fail exactly like an
/// unknown one. Not `Debug`: it carries the plaintext password.
pub struct LoginCommand {
    pub email: String,
    pub password: String,
}

/// Upper bound for refresh token lifetimes.
pub fn max_refresh_token_ttl() -> Duration {
    Duration::days(3650)
}

/// Token lifetimes and lifecycle policies.
///
/// Only constructible with a refresh lifetime in `(0, 3650 days]`.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    refresh_token_ttl: Duration,
    issue_tokens_on_register: bool,
    revoke_family_on_reuse: bool,
}

impl SessionSettings {
    /// # Errors
    /// * `Configuration` - Refresh lifetime not positive or above the bound
    pub fn new(refresh_token_ttl: Duration) -> Result<Self, SessionError> {
        if refresh_token_ttl <= Duration::zero() {
            return Err(SessionError::Configuration(
                "Refresh token TTL must be positive".to_string(),
            ));
        }

        if refresh_token_ttl > max_refresh_token_ttl() {
            return Err(SessionError::Configuration(format!(
                "Refresh token TTL must not exceed {} days, got {} days",
                max_refresh_token_ttl().num_days(),
                refresh_token_ttl.num_days()
            )));
        }

        Ok(Self {
            refresh_token_ttl,
            issue_tokens_on_register: false,
            revoke_family_on_reuse: false,
        })
    }

    pub fn with_tokens_on_register(mut self, enabled: bool) -> Self {
        self.issue_tokens_on_register = enabled;
        self
    }

    pub fn with_family_revocation_on_reuse(mut self, enabled: bool) -> Self {
        self.revoke_family_on_reuse = enabled;
        self
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }

    pub fn issue_tokens_on_register(&self) -> bool {
        self.issue_tokens_on_register
    }

    pub fn revoke_family_on_reuse(&self) -> bool {
        self.revoke_family_on_reuse
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_token_ttl: Duration::days(30),
            issue_tokens_on_register: false,
            revoke_family_on_reuse: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_token(now: DateTime<Utc>) -> RefreshToken {
        RefreshToken::issue(
            RefreshSecret::new("secret-1".to_string()),
            UserId::new(),
            now,
            Duration::days(30),
        )
    }

    #[test]
    fn test_issued_token_is_live_until_expiry() {
        let now = Utc::now();
        let token = live_token(now);

        assert_eq!(token.status(now), TokenStatus::Live);
        assert_eq!(
            token.status(now + Duration::days(30) - Duration::seconds(1)),
            TokenStatus::Live
        );
        assert_eq!(
            token.status(now + Duration::days(30)),
            TokenStatus::Expired
        );
    }

    #[test]
    fn test_rotated_and_revoked_are_distinct() {
        let now = Utc::now();

        let mut rotated = live_token(now);
        rotated.rotate_to(&RefreshSecret::new("secret-2".to_string()), now);
        assert_eq!(rotated.status(now), TokenStatus::Rotated);

        let mut revoked = live_token(now);
        revoked.revoke(now);
        assert_eq!(revoked.status(now), TokenStatus::Revoked);
    }

    #[test]
    fn test_revocation_takes_precedence_over_expiry() {
        let now = Utc::now();
        let mut token = live_token(now);
        token.revoke(now);

        assert_eq!(
            token.status(now + Duration::days(60)),
            TokenStatus::Revoked
        );
    }

    #[test]
    fn test_issue_saturates_instead_of_overflowing() {
        let now = Utc::now();
        let token = RefreshToken::issue(
            RefreshSecret::new("secret-1".to_string()),
            UserId::new(),
            now,
            Duration::MAX,
        );

        assert_eq!(token.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(token.is_live(now));
    }

    #[test]
    fn test_session_settings_reject_non_positive_ttl() {
        for ttl in [Duration::zero(), Duration::days(-1), Duration::seconds(-1)] {
            assert!(matches!(
                SessionSettings::new(ttl),
                Err(SessionError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_session_settings_reject_huge_ttl() {
        assert!(matches!(
            SessionSettings::new(Duration::days(3651)),
            Err(SessionError::Configuration(_))
        ));
        assert!(matches!(
            SessionSettings::new(Duration::days(100_000_000)),
            Err(SessionError::Configuration(_))
        ));
    }

    #[test]
    fn test_session_settings_accept_bounds() {
        let settings = SessionSettings::new(Duration::seconds(1)).unwrap();
        assert_eq!(settings.refresh_token_ttl(), Duration::seconds(1));

        let settings = SessionSettings::new(max_refresh_token_ttl())
            .unwrap()
            .with_tokens_on_register(true)
            .with_family_revocation_on_reuse(true);
        assert_eq!(settings.refresh_token_ttl(), Duration::days(3650));
        assert!(settings.issue_tokens_on_register());
        assert!(settings.revoke_family_on_reuse());
    }

    #[test]
    fn test_refresh_secret_debug_is_redacted() {
        let secret = RefreshSecret::new("very-secret-value".to_string());
        assert!(!format!("{:?}", secret).contains("very-secret-value"));
    }
}
