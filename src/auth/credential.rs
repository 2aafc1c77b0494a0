//! Password hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use super::{AuthError, AuthResult};

/// Turns plaintext passwords into stored hashes and checks them later
pub trait Credential: Send + Sync {
    fn hash(&self, plaintext: &str) -> AuthResult<String>;

    /// A malformed stored hash never verifies
    fn verify(&self, plaintext: &str, stored: &str) -> bool;
}

/// Argon2id with a random salt per hash
#[derive(Debug, Clone, Default)]
pub struct Argon2Credential;

impl Credential for Argon2Credential {
    fn hash(&self, plaintext: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify(&self, plaintext: &str, stored: &str) -> bool {
        let parsed_hash = match PasswordHash::new(stored) {
            Ok(h) => h,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Validate password strength
/// Returns None if valid, or Some(error_message) if invalid
pub fn validate_password_strength(password: &str) -> Option<String> {
    if password.chars().count() < 8 {
        return Some("Password must be at least 8 characters".to_string());
    }

    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_letter {
        return Some("Password must contain at least one letter".to_string());
    }
    if !has_digit {
        return Some("Password must contain at least one digit".to_string());
    }

    let common_passwords = ["password1", "password123", "12345678a", "qwerty123", "letmein1"];
    let lower = password.to_lowercase();
    if common_passwords.contains(&lower.as_str()) {
        return Some("Password is too common. Please choose a stronger password.".to_string());
    }

    None
}
