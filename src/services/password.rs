//! Password hashing
//!
//! Argon2id with the crate's default cost parameters and a fresh random
//! salt per hash. Stored values are PHC strings.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Shortest password accepted at registration
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a plaintext password into a PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Failed to hash password: {}", e))
}

/// Check a plaintext password against a stored PHC string.
///
/// A mismatch is `Ok(false)`; a malformed hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {}", e))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Password verification failed: {}", e)),
    }
}

/// Length check applied before hashing, counted in characters
pub fn is_acceptable_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_and_salted() {
        let first = hash_password("plantao-24h").expect("Failed to hash password");
        let second = hash_password("plantao-24h").expect("Failed to hash password");

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(!first.contains("plantao-24h"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("residencia2026").unwrap();

        assert!(verify_password("residencia2026", &hash).unwrap());
        assert!(!verify_password("residencia2025", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("qualquer", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_unicode_password_roundtrip() {
        let hash = hash_password("coração❤️estetoscópio").unwrap();
        assert!(verify_password("coração❤️estetoscópio", &hash).unwrap());
    }

    #[test]
    fn test_password_policy_counts_characters() {
        assert!(!is_acceptable_password("curta"));
        assert!(is_acceptable_password("12345678"));
        assert!(is_acceptable_password("çãõéíóúâ"));
        assert!(!is_acceptable_password("çãõéíóú"));
    }
}
