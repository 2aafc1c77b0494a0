//! Session authentication, password resets and team invitations.
//!
//! Raw tokens only ever leave this module in responses and emails; the
//! database stores their SHA-256 hashes.

pub mod credential;
pub mod invite;
pub mod reset;
pub mod session;

pub use credential::{validate_password_strength, Argon2Credential, Credential};
pub use invite::InviteService;
pub use reset::PasswordResetService;
pub use session::{Authorization, IssuedSession, SessionReader, SessionService, SESSION_COOKIE};

use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors surfaced by the auth services
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown user and wrong password share this variant and message
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Expired(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        AuthError::Internal("database error".to_string())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Generate a random token (32 bytes, hex encoded)
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Usernames are case-insensitive and stored lowercase
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_is_stable() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("  Owner@Brush.Work "), "owner@brush.work");
    }
}
