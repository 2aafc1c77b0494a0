//! Session issuance, validation and the role gate.

use axum::http::{header, HeaderMap};
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::{
    generate_token, hash_token, normalize_username, validate_password_strength, AuthError,
    AuthResult, Credential,
};
use crate::db::{timestamp, DbPool, Role, SessionWithUser, User, UserResponse};

/// Session token cookie name
pub const SESSION_COOKIE: &str = "admin_session";

/// Verified against when the username is unknown, so both login failures cost one hash check
const TIMING_PASSWORD: &str = "brushwork-timing-equalizer-1";

/// A freshly issued session. `token` is the only copy of the raw token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub user: UserResponse,
    pub expires_at: String,
}

/// Outcome of the role gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Granted(UserResponse),
    Forbidden(UserResponse),
    Unauthenticated,
}

impl Authorization {
    pub fn into_result(self) -> AuthResult<UserResponse> {
        match self {
            Authorization::Granted(user) => Ok(user),
            Authorization::Forbidden(user) => Err(AuthError::Forbidden(format!(
                "Role '{}' is not allowed to perform this action",
                user.role
            ))),
            Authorization::Unauthenticated => Err(AuthError::Unauthenticated),
        }
    }
}

#[derive(Clone)]
pub struct SessionService {
    db: DbPool,
    credential: Arc<dyn Credential>,
    session_ttl: Duration,
    timing_hash: Arc<OnceCell<String>>,
}

impl SessionService {
    pub fn new(db: DbPool, credential: Arc<dyn Credential>, session_ttl: Duration) -> Self {
        Self {
            db,
            credential,
            session_ttl,
            timing_hash: Arc::new(OnceCell::new()),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Verify credentials and issue a new session
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<IssuedSession> {
        let username = normalize_username(username);
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let Some(user) = User::find_by_username(&self.db, &username).await? else {
            let stored = self.timing_hash().await?;
            let _ = self.credential.verify(password, stored);
            return Err(AuthError::InvalidCredentials);
        };

        if !self.credential.verify(password, &user.password_hash) {
            tracing::info!(user_id = %user.id, "Rejected login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self.issue(UserResponse::from(user)).await?;
        tracing::info!(user_id = %issued.user.id, "User logged in");
        Ok(issued)
    }

    /// Resolve a token to its user. Expired sessions are deleted on sight.
    pub async fn validate(&self, token: &str) -> AuthResult<UserResponse> {
        if token.is_empty() {
            return Err(AuthError::Unauthenticated);
        }

        let session: Option<SessionWithUser> = sqlx::query_as(
            r#"
            SELECT s.id AS session_id, s.expires_at, u.id AS user_id, u.username, u.role
            FROM auth_sessions s
            JOIN auth_users u ON u.id = s.user_id
            WHERE s.token_hash = ?
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(&self.db)
        .await?;

        let session = session.ok_or(AuthError::Unauthenticated)?;

        if session.is_expired() {
            sqlx::query("DELETE FROM auth_sessions WHERE id = ?")
                .bind(&session.session_id)
                .execute(&self.db)
                .await?;
            tracing::debug!(session_id = %session.session_id, "Removed expired session");
            return Err(AuthError::Unauthenticated);
        }

        Ok(session.user())
    }

    /// Delete the session if it exists. Unknown tokens are not an error.
    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE token_hash = ?")
            .bind(hash_token(token))
            .execute(&self.db)
            .await?;

        if result.rows_affected() > 0 {
            tracing::info!("Session revoked on logout");
        }
        Ok(())
    }

    /// Validate the token and check the user's role against `required`
    pub async fn authorize(&self, token: Option<&str>, required: Role) -> AuthResult<Authorization> {
        let Some(token) = token else {
            return Ok(Authorization::Unauthenticated);
        };

        let user = match self.validate(token).await {
            Ok(user) => user,
            Err(AuthError::Unauthenticated) => return Ok(Authorization::Unauthenticated),
            Err(e) => return Err(e),
        };

        if user.role_enum().has_at_least(required) {
            Ok(Authorization::Granted(user))
        } else {
            Ok(Authorization::Forbidden(user))
        }
    }

    /// Change the password of the session's user and revoke their other sessions
    pub async fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let session_user = self.validate(token).await?;

        let user = User::find_by_id(&self.db, &session_user.id)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        if !self.credential.verify(current_password, &user.password_hash) {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }
        if let Some(error) = validate_password_strength(new_password) {
            return Err(AuthError::Validation(error));
        }

        let password_hash = self.credential.hash(new_password)?;
        let now = crate::db::now_timestamp();

        let mut tx = self.db.begin().await?;
        sqlx::query("UPDATE auth_users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(&now)
            .bind(&user.id)
            .execute(&mut *tx)
            .await?;
        let revoked = sqlx::query("DELETE FROM auth_sessions WHERE user_id = ? AND token_hash != ?")
            .bind(&user.id)
            .bind(hash_token(token))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            revoked_sessions = revoked.rows_affected(),
            "Password changed"
        );
        Ok(())
    }

    /// Create an account. Fails with `Conflict` if the username is taken.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> AuthResult<UserResponse> {
        let username = normalize_username(username);
        if username.is_empty() {
            return Err(AuthError::Validation("Username is required".to_string()));
        }
        if let Some(error) = validate_password_strength(password) {
            return Err(AuthError::Validation(error));
        }
        if User::find_by_username(&self.db, &username).await?.is_some() {
            return Err(AuthError::Conflict("Username is already taken".to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let password_hash = self.credential.hash(password)?;
        let now = crate::db::now_timestamp();

        sqlx::query(
            "INSERT INTO auth_users (id, username, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&username)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await?;

        tracing::info!(user_id = %id, role = %role, "Created user");

        Ok(UserResponse {
            id,
            username,
            role: role.as_str().to_string(),
        })
    }

    /// True until the first account exists
    pub async fn needs_setup(&self) -> AuthResult<bool> {
        Ok(User::count(&self.db).await? == 0)
    }

    /// Create the first owner and log them in
    pub async fn setup(&self, username: &str, password: &str) -> AuthResult<IssuedSession> {
        if !self.needs_setup().await? {
            return Err(AuthError::Forbidden(
                "Setup has already been completed".to_string(),
            ));
        }

        let user = self.create_user(username, password, Role::Owner).await?;
        tracing::info!(user_id = %user.id, "Created owner during setup");
        self.issue(user).await
    }

    /// Provision the configured owner at startup. Returns true if one was created.
    pub async fn ensure_owner(&self, username: &str, password: &str) -> AuthResult<bool> {
        if !self.needs_setup().await? {
            return Ok(false);
        }
        self.create_user(username, password, Role::Owner).await?;
        Ok(true)
    }

    /// Hash of a throwaway password, computed once per service
    async fn timing_hash(&self) -> AuthResult<&str> {
        let hash = self
            .timing_hash
            .get_or_try_init(|| async { self.credential.hash(TIMING_PASSWORD) })
            .await?;
        Ok(hash.as_str())
    }

    async fn issue(&self, user: UserResponse) -> AuthResult<IssuedSession> {
        let token = generate_token();
        let expires_at = timestamp(Utc::now() + self.session_ttl);

        sqlx::query(
            "INSERT INTO auth_sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&user.id)
        .bind(hash_token(&token))
        .bind(&expires_at)
        .bind(crate::db::now_timestamp())
        .execute(&self.db)
        .await?;

        Ok(IssuedSession {
            token,
            user,
            expires_at,
        })
    }
}

/// Reads session tokens from requests and writes the session cookie
pub struct SessionReader;

impl SessionReader {
    /// The `admin_session` cookie wins over an `Authorization: Bearer` header
    pub fn token(headers: &HeaderMap) -> Option<String> {
        let jar = CookieJar::from_headers(headers);
        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            let value = cookie.value().trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }

        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    /// `Set-Cookie` value for a new session
    pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> String {
        Self::cookie(token, ttl.num_seconds().max(0), secure)
    }

    /// `Set-Cookie` value that clears the session cookie
    pub fn clear_cookie(secure: bool) -> String {
        Self::cookie("", 0, secure)
    }

    fn cookie(value: &str, max_age: i64, secure: bool) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE, value, max_age
        );
        if secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
