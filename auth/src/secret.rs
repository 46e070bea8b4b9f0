use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Smallest accepted secret size (256 bits).
pub const MIN_SECRET_BYTES: usize = 32;

/// Error type for secret generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("Secret must be at least {min} bytes, got {actual}")]
    TooShort { min: usize, actual: usize },
}

/// Generate an opaque bearer secret.
///
/// Draws `num_bytes` from the operating system CSPRNG and encodes them as
/// URL-safe base64 without padding.
///
/// # Errors
/// * `TooShort` - Fewer than 32 bytes requested
pub fn generate_secret(num_bytes: usize) -> Result<String, SecretError> {
    if num_bytes < MIN_SECRET_BYTES {
        return Err(SecretError::TooShort {
            min: MIN_SECRET_BYTES,
            actual: num_bytes,
        });
    }

    let mut bytes = vec![0u8; num_bytes];
    OsRng.fill_bytes(&mut bytes);

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
