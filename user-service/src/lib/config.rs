use std::env;

use chrono::Duration;
use config::builder::DefaultState;
use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::domain::session::errors::SessionError;
use crate::domain::session::issuer::TokenSettings;
use crate::domain::session::models::SessionSettings;

type Builder = config::builder::ConfigBuilder<DefaultState>;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Required when `storage.backend` is `postgres`.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_days: i64,
    pub refresh_secret_bytes: usize,
}

// Keeps the signing key out of logs.
impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("refresh_secret_bytes", &self.refresh_secret_bytes)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub issue_tokens_on_register: bool,
    pub revoke_family_on_reuse: bool,
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (JWT__SECRET, DATABASE__URL, SERVER__HTTP_PORT, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = Self::defaults(ConfigBuilder::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Example: JWT__SECRET=... overrides jwt.secret
            .add_source(Environment::default().separator("__"))
            .build()?;

        configuration.try_deserialize()
    }

    /// Every key except `jwt.secret` and `database.url` has a default.
    fn defaults(builder: Builder) -> Result<Builder, ConfigError> {
        builder
            .set_default("database.max_connections", 5_i64)?
            .set_default("server.http_port", 8080_i64)?
            .set_default("server.request_timeout_secs", 30_i64)?
            .set_default("storage.backend", "postgres")?
            .set_default("jwt.issuer", "MiniCommerce.UserService")?
            .set_default("jwt.audience", "MiniCommerceClients")?
            .set_default("jwt.access_token_ttl_secs", 3600_i64)?
            .set_default("jwt.refresh_token_ttl_days", 30_i64)?
            .set_default("jwt.refresh_secret_bytes", 64_i64)?
            .set_default("session.issue_tokens_on_register", false)?
            .set_default("session.revoke_family_on_reuse", false)
    }

    /// # Errors
    /// * `Configuration` - `jwt.access_token_ttl_secs` is not a representable duration
    pub fn token_settings(&self) -> Result<TokenSettings, SessionError> {
        let access_token_ttl =
            Duration::try_seconds(self.jwt.access_token_ttl_secs).ok_or_else(|| {
                SessionError::Configuration(format!(
                    "jwt.access_token_ttl_secs out of range: {}",
                    self.jwt.access_token_ttl_secs
                ))
            })?;

        Ok(TokenSettings {
            signing_secret: self.jwt.secret.clone(),
            issuer: self.jwt.issuer.clone(),
            audience: self.jwt.audience.clone(),
            access_token_ttl,
            refresh_secret_bytes: self.jwt.refresh_secret_bytes,
        })
    }

    /// # Errors
    /// * `Configuration` - `jwt.refresh_token_ttl_days` is not positive or
    ///   exceeds the refresh lifetime bound
    pub fn session_settings(&self) -> Result<SessionSettings, SessionError> {
        let refresh_token_ttl =
            Duration::try_days(self.jwt.refresh_token_ttl_days).ok_or_else(|| {
                SessionError::Configuration(format!(
                    "jwt.refresh_token_ttl_days out of range: {}",
                    self.jwt.refresh_token_ttl_days
                ))
            })?;

        Ok(SessionSettings::new(refresh_token_ttl)?
            .with_tokens_on_register(self.session.issue_tokens_on_register)
            .with_family_revocation_on_reuse(self.session.revoke_family_on_reuse))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.server.request_timeout_secs)
    }
}
