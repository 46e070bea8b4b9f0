use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher as Argon2PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::Argon2;

use super::errors::PasswordError;

/// Plaintext hashed once per process to produce the decoy hash.
const DECOY_PASSWORD: &str = "decoy-password-never-matches";

/// Password hashing and verification.
///
/// Produces salted Argon2id hashes in PHC string format. Verification
/// compares digests in constant time, so the time taken does not depend
/// on how much of the password matched.
pub struct CredentialVerifier {
    decoy_hash: Option<String>,
}

impl CredentialVerifier {
    /// Create a new verifier with Argon2id default parameters.
    ///
    /// Hashes the decoy up front, so the first unknown-account login costs
    /// the same as any other.
    pub fn new() -> Self {
        let mut verifier = Self { decoy_hash: None };
        verifier.decoy_hash = verifier.hash(DECOY_PASSWORD).ok();
        verifier
    }

    /// Hash a plaintext password.
    ///
    /// Every call draws a fresh salt from the OS random generator, so two
    /// hashes of the same password differ.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to hash
    ///
    /// # Returns
    /// PHC string format hash (includes algorithm, parameters, salt, and hash)
    ///
    /// # Errors
    /// * `EmptyPassword` - Password is empty
    /// * `HashingFailed` - Password hashing operation failed
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.is_empty() {
            return Err(PasswordError::EmptyPassword);
        }

        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Verify a password against a stored hash.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to verify
    /// * `hash` - Stored password hash in PHC string format
    ///
    /// # Returns
    /// True if password matches, false otherwise
    ///
    /// # Errors
    /// * `MalformedHash` - Stored hash is not a valid PHC string
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Spend the cost of a verification without a real hash.
    ///
    /// Used when no account exists for a login attempt, so the response
    /// time matches that of a wrong password. Always returns false.
    pub fn verify_decoy(&self, password: &str) -> bool {
        match &self.decoy_hash {
            Some(hash) => {
                let _ = self.verify(password, hash);
            }
            // Same Argon2 cost as a verification.
            None => {
                let _ = self.hash(DECOY_PASSWORD);
            }
        }

        false
    }
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::new()
    }
}
