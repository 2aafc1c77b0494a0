//! Password reset via single-use emailed tokens.

use chrono::{Duration, Utc};
use std::sync::Arc;

use super::{
    generate_token, hash_token, normalize_username, validate_password_strength, AuthError,
    AuthResult, Credential,
};
use crate::config::ServerConfig;
use crate::db::{timestamp, DbPool, PasswordResetToken, TeamMember, User};
use crate::notifications::SystemEmailService;

const INVALID_TOKEN: &str = "Invalid or expired reset token";

#[derive(Clone)]
pub struct PasswordResetService {
    db: DbPool,
    credential: Arc<dyn Credential>,
    email: Arc<SystemEmailService>,
    server: ServerConfig,
    token_ttl: Duration,
}

impl PasswordResetService {
    pub fn new(
        db: DbPool,
        credential: Arc<dyn Credential>,
        email: Arc<SystemEmailService>,
        server: ServerConfig,
        token_ttl: Duration,
    ) -> Self {
        Self {
            db,
            credential,
            email,
            server,
            token_ttl,
        }
    }

    /// Start a reset for a username or team email.
    ///
    /// Callers must answer with success whatever this returns, so unknown
    /// accounts are not revealed. Returns the raw token when one was issued.
    pub async fn request(&self, identifier: &str) -> AuthResult<Option<String>> {
        let identifier = normalize_username(identifier);
        if identifier.is_empty() {
            return Ok(None);
        }

        let Some((user, address)) = self.resolve_account(&identifier).await? else {
            tracing::info!("Password reset requested for unknown account");
            return Ok(None);
        };

        let Some(address) = address else {
            tracing::warn!(user_id = %user.id, "No email address on file, skipping password reset");
            return Ok(None);
        };

        let token = generate_token();
        sqlx::query(
            "INSERT INTO password_reset_tokens (id, user_id, token_hash, expires_at, used, created_at) VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&user.id)
        .bind(hash_token(&token))
        .bind(timestamp(Utc::now() + self.token_ttl))
        .bind(crate::db::now_timestamp())
        .execute(&self.db)
        .await?;

        let reset_url = self
            .server
            .public_link(&format!("reset-password?token={}", token));
        // Sent off the request path so known accounts answer as fast as unknown ones
        let email = self.email.clone();
        let expires_in_minutes = self.token_ttl.num_minutes();
        let user_id = user.id.clone();
        tokio::spawn(async move {
            if let Err(e) = email
                .send_password_reset_email(&address, &reset_url, expires_in_minutes)
                .await
            {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to send password reset email");
            }
        });

        tracing::info!(user_id = %user.id, "Password reset token issued");
        Ok(Some(token))
    }

    /// Consume a reset token and set a new password.
    ///
    /// Runs in one transaction that opens with the guarded `used = 0`
    /// update, so of two concurrent confirms only one succeeds and the
    /// other sees Conflict.
    pub async fn confirm(&self, token: &str, new_password: &str) -> AuthResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Validation(INVALID_TOKEN.to_string()));
        }
        if let Some(error) = validate_password_strength(new_password) {
            return Err(AuthError::Validation(error));
        }

        let password_hash = self.credential.hash(new_password)?;
        let token_hash = hash_token(token);
        let now = crate::db::now_timestamp();

        let mut tx = self.db.begin().await?;

        let claimed = sqlx::query(
            "UPDATE password_reset_tokens SET used = 1 WHERE token_hash = ? AND used = 0",
        )
        .bind(&token_hash)
        .execute(&mut *tx)
        .await?;

        let record: Option<PasswordResetToken> =
            sqlx::query_as("SELECT * FROM password_reset_tokens WHERE token_hash = ?")
                .bind(&token_hash)
                .fetch_optional(&mut *tx)
                .await?;

        let record = record.ok_or_else(|| AuthError::Validation(INVALID_TOKEN.to_string()))?;
        if claimed.rows_affected() == 0 {
            return Err(AuthError::Conflict(
                "Reset token has already been used".to_string(),
            ));
        }
        // Dropping the transaction rolls the claim back
        if record.is_expired() {
            return Err(AuthError::Expired("Reset token has expired".to_string()));
        }

        sqlx::query("UPDATE auth_users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(&now)
            .bind(&record.user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM auth_sessions WHERE user_id = ?")
            .bind(&record.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %record.user_id, "Password reset completed");
        Ok(())
    }

    /// Match by username first, then by team roster email
    async fn resolve_account(&self, identifier: &str) -> AuthResult<Option<(User, Option<String>)>> {
        if let Some(user) = User::find_by_username(&self.db, identifier).await? {
            let address = if user.username.contains('@') {
                Some(user.username.clone())
            } else {
                sqlx::query_scalar("SELECT email FROM team_members WHERE user_id = ?")
                    .bind(&user.id)
                    .fetch_optional(&self.db)
                    .await?
            };
            return Ok(Some((user, address)));
        }

        let Some(member) = TeamMember::find_by_email(&self.db, identifier).await? else {
            return Ok(None);
        };
        let Some(user_id) = member.user_id.as_deref() else {
            return Ok(None);
        };

        Ok(User::find_by_id(&self.db, user_id)
            .await?
            .map(|user| (user, Some(member.email.clone()))))
    }
}
