//! Authentication utilities library
//!
//! Provides reusable authentication infrastructure for microservices:
//! - Password hashing and verification (Argon2id)
//! - JWT token generation and validation
//! - Opaque bearer secret generation
//!
//! Each service defines its own authentication traits and adapts these implementations.
//! This avoids coupling services through shared domain logic while reducing code duplication.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::CredentialVerifier;
//!
//! let verifier = CredentialVerifier::new();
//! let hash = verifier.hash("my_password").unwrap();
//! let is_valid = verifier.verify("my_password", &hash).unwrap();
//! assert!(is_valid);
//! ```
//!
//! ## JWT Tokens
//! ```
//! use auth::{Claims, JwtHandler};
//! use chrono::{Duration, Utc};
//!
//! let handler = JwtHandler::new(b"secret_key_at_least_32_bytes_long!")
//!     .unwrap()
//!     .with_issuer("my-service");
//! let claims = Claims::for_subject("user123", Utc::now(), Duration::hours(1))
//!     .with_issuer("my-service");
//! let token = handler.encode(&claims).unwrap();
//! let decoded: Claims = handler.decode(&token).unwrap();
//! assert_eq!(decoded.sub.as_deref(), Some("user123"));
//! ```
//!
//! ## Refresh Secrets
//! ```
//! let secret = auth::generate_secret(64).unwrap();
//! assert_eq!(secret.len(), 86);
//! ```

pub mod jwt;
pub mod password;
pub mod secret;

// Re-export commonly used items
pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use password::CredentialVerifier;
pub use password::PasswordError;
pub use secret::generate_secret;
pub use secret::SecretError;
