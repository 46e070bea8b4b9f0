use auth::Claims;
use auth::JwtError;
use auth::JwtHandler;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::session::errors::SessionError;
use crate::domain::session::models::AccessToken;
use crate::domain::session::models::RefreshSecret;
use crate::domain::user::models::User;

/// Signing key, claim values, and sizes used to mint tokens.
///
/// Built once from configuration at startup and never mutated.
#[derive(Clone)]
pub struct TokenSettings {
    pub signing_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl: Duration,
    pub refresh_secret_bytes: usize,
}

/// Upper bound for access token lifetimes.
pub fn max_access_token_ttl() -> Duration {
    Duration::days(1)
}

/// Mints signed access tokens and opaque refresh secrets.
pub struct TokenIssuer {
    jwt_handler: JwtHandler,
    issuer: String,
    audience: String,
    access_token_ttl: Duration,
    refresh_secret_bytes: usize,
}

impl TokenIssuer {
    /// Build an issuer from settings.
    ///
    /// # Errors
    /// * `Configuration` - Signing key too short, access TTL outside
    ///   `(0, 1 day]`, or refresh secret size below 32 bytes
    pub fn new(settings: &TokenSettings) -> Result<Self, SessionError> {
        let jwt_handler = JwtHandler::new(settings.signing_secret.as_bytes())
            .map_err(|e| SessionError::Configuration(e.to_string()))?
            .with_issuer(&settings.issuer)
            .with_audience(&settings.audience);

        if settings.access_token_ttl <= Duration::zero() {
            return Err(SessionError::Configuration(
                "Access token TTL must be positive".to_string(),
            ));
        }

        if settings.access_token_ttl > max_access_token_ttl() {
            return Err(SessionError::Configuration(format!(
                "Access token TTL must not exceed {} seconds, got {} seconds",
                max_access_token_ttl().num_seconds(),
                settings.access_token_ttl.num_seconds()
            )));
        }

        if settings.refresh_secret_bytes < auth::secret::MIN_SECRET_BYTES {
            return Err(SessionError::Configuration(format!(
                "Refresh secret must be at least {} bytes, got {}",
                auth::secret::MIN_SECRET_BYTES,
                settings.refresh_secret_bytes
            )));
        }

        Ok(Self {
            jwt_handler,
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            access_token_ttl: settings.access_token_ttl,
            refresh_secret_bytes: settings.refresh_secret_bytes,
        })
    }

    /// Lifetime of access tokens minted by this issuer.
    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    /// Mint a signed access token for `user`, valid from `now`.
    ///
    /// Claims: `sub` (user id), `email`, `name`, `given_name`,
    /// `family_name`, `role`, `iss`, `aud`, `iat`, `nbf`, `exp`, and a
    /// random `jti` so that two tokens minted in the same second differ.
    pub fn issue_access_token(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<AccessToken, SessionError> {
        let expires_at = now
            .checked_add_signed(self.access_token_ttl)
            .ok_or_else(|| SessionError::Unknown("Access token expiry out of range".to_string()))?;

        let claims = Claims::for_subject(user.id, now, self.access_token_ttl)
            .with_issuer(&self.issuer)
            .with_audience(&self.audience)
            .with_jwt_id(Uuid::new_v4())
            .with_extra("email", user.email.as_str())
            .with_extra("name", user.display_name())
            .with_extra("given_name", user.first_name.as_str())
            .with_extra("family_name", user.last_name.as_str())
            .with_extra("role", user.role.as_str());

        let token = self
            .jwt_handler
            .encode(&claims)
            .map_err(|e| SessionError::Unknown(format!("Token generation failed: {}", e)))?;

        Ok(AccessToken { token, expires_at })
    }

    /// Generate a fresh refresh secret from the OS random generator.
    pub fn issue_refresh_secret(&self) -> Result<RefreshSecret, SessionError> {
        auth::generate_secret(self.refresh_secret_bytes)
            .map(RefreshSecret::new)
            .map_err(|e| SessionError::Configuration(e.to_string()))
    }

    /// Validate an access token minted by this issuer and return its claims.
    ///
    /// Used by the transport layer on protected routes.
    pub fn decode_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.jwt_handler.decode(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::models::EmailAddress;
    use crate::domain::user::models::PasswordHash;
    use crate::domain::user::models::PersonName;
    use crate::domain::user::models::Role;
    use crate::domain::user::models::UserId;

    fn settings() -> TokenSettings {
        TokenSettings {
            signing_secret: "test-secret-key-for-jwt-signing-at-least-32-bytes".to_string(),
            issuer: "MiniCommerce.UserService".to_string(),
            audience: "MiniCommerceClients".to_string(),
            access_token_ttl: Duration::hours(1),
            refresh_secret_bytes: 64,
        }
    }

    fn sample_user() -> User {
        User {
            id: UserId::new(),
            email: EmailAddress::new("a@x.com".to_string()).unwrap(),
            password_hash: PasswordHash::new("$argon2id$test_hash".to_string()),
            first_name: PersonName::new("A".to_string()).unwrap(),
            last_name: PersonName::new("B".to_string()).unwrap(),
            role: Role::Customer,
            created_at: Utc::now(),
            updated_at: None,
            is_active: true,
        }
    }

    #[test]
    fn test_access_token_carries_identity_claims() {
        let issuer = TokenIssuer::new(&settings()).unwrap();
        let user = sample_user();
        let now = Utc::now();

        let access = issuer.issue_access_token(&user, now).unwrap();
        assert_eq!(access.expires_at, now + Duration::hours(1));

        let claims = issuer.decode_access_token(&access.token).unwrap();
        assert_eq!(claims.sub, Some(user.id.to_string()));
        assert_eq!(claims.iss.as_deref(), Some("MiniCommerce.UserService"));
        assert_eq!(claims.aud.as_deref(), Some("MiniCommerceClients"));
        assert_eq!(claims.nbf, Some(now.timestamp()));
        assert_eq!(claims.exp, Some((now + Duration::hours(1)).timestamp()));
        assert_eq!(claims.extra_str("email"), Some("a@x.com"));
        assert_eq!(claims.extra_str("name"), Some("A B"));
        assert_eq!(claims.extra_str("role"), Some("Customer"));
        assert!(claims.jti.is_some());
    }

    #[test]
    fn test_access_tokens_minted_together_differ() {
        let issuer = TokenIssuer::new(&settings()).unwrap();
        let user = sample_user();
        let now = Utc::now();

        let first = issuer.issue_access_token(&user, now).unwrap();
        let second = issuer.issue_access_token(&user, now).unwrap();
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_token_from_other_issuer_rejected() {
        let issuer = TokenIssuer::new(&settings()).unwrap();
        let other = TokenIssuer::new(&TokenSettings {
            issuer: "someone-else".to_string(),
            ..settings()
        })
        .unwrap();

        let access = other.issue_access_token(&sample_user(), Utc::now()).unwrap();
        assert!(issuer.decode_access_token(&access.token).is_err());
    }

    #[test]
    fn test_refresh_secrets_are_unique_and_long() {
        let issuer = TokenIssuer::new(&settings()).unwrap();

        let first = issuer.issue_refresh_secret().unwrap();
        let second = issuer.issue_refresh_secret().unwrap();

        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 86);
    }

    #[test]
    fn test_short_signing_key_is_configuration_error() {
        let result = TokenIssuer::new(&TokenSettings {
            signing_secret: "short".to_string(),
            ..settings()
        });
        assert!(matches!(result, Err(SessionError::Configuration(_))));
    }

    #[test]
    fn test_small_refresh_secret_is_configuration_error() {
        let result = TokenIssuer::new(&TokenSettings {
            refresh_secret_bytes: 16,
            ..settings()
        });
        assert!(matches!(result, Err(SessionError::Configuration(_))));
    }

    #[test]
    fn test_access_ttl_outside_bounds_is_configuration_error() {
        for access_token_ttl in [Duration::zero(), Duration::seconds(-60), Duration::days(2)] {
            let result = TokenIssuer::new(&TokenSettings {
                access_token_ttl,
                ..settings()
            });
            assert!(matches!(result, Err(SessionError::Configuration(_))));
        }

        assert!(TokenIssuer::new(&TokenSettings {
            access_token_ttl: max_access_token_ttl(),
            ..settings()
        })
        .is_ok());
    }

    #[test]
    fn test_expiry_out_of_range_is_error_not_panic() {
        let issuer = TokenIssuer::new(&settings()).unwrap();
        let result = issuer.issue_access_token(&sample_user(), DateTime::<Utc>::MAX_UTC);

        assert!(matches!(result, Err(SessionError::Unknown(_))));
    }
}
