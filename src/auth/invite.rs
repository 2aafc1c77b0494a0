//! Team invitations: owners invite by email, invitees accept with a password.

use chrono::{Duration, Utc};
use std::sync::Arc;

use super::{
    generate_token, hash_token, normalize_username, validate_password_strength, AuthError,
    AuthResult, Credential,
};
use crate::config::ServerConfig;
use crate::db::{timestamp, DbPool, Role, TeamInvite, User, UserResponse};
use crate::notifications::SystemEmailService;
use crate::validation::{validate_email, validate_invite_role, validate_name};

/// A stored invitation plus what the owner needs to share it
#[derive(Debug, Clone)]
pub struct CreatedInvite {
    pub invite: TeamInvite,
    pub token: String,
    pub accept_url: String,
    pub email_sent: bool,
}

#[derive(Clone)]
pub struct InviteService {
    db: DbPool,
    credential: Arc<dyn Credential>,
    email: Arc<SystemEmailService>,
    server: ServerConfig,
    invite_ttl: Duration,
}

impl InviteService {
    pub fn new(
        db: DbPool,
        credential: Arc<dyn Credential>,
        email: Arc<SystemEmailService>,
        server: ServerConfig,
        invite_ttl: Duration,
    ) -> Self {
        Self {
            db,
            credential,
            email,
            server,
            invite_ttl,
        }
    }

    /// Invite someone to the team. Only owners may call this.
    pub async fn create(
        &self,
        inviter: &UserResponse,
        email: &str,
        role: &str,
    ) -> AuthResult<CreatedInvite> {
        if inviter.role_enum() != Role::Owner {
            return Err(AuthError::Forbidden(
                "Only the owner can invite team members".to_string(),
            ));
        }

        let email = normalize_username(email);
        validate_email(&email).map_err(AuthError::Validation)?;
        let role = validate_invite_role(role).map_err(AuthError::Validation)?;

        if User::find_by_username(&self.db, &email).await?.is_some() {
            return Err(AuthError::Conflict(
                "This person already has an account".to_string(),
            ));
        }

        let token = generate_token();
        let now = crate::db::now_timestamp();
        let invite = TeamInvite {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.clone(),
            role: role.as_str().to_string(),
            token_hash: hash_token(&token),
            expires_at: timestamp(Utc::now() + self.invite_ttl),
            accepted_at: None,
            invited_by: Some(inviter.id.clone()),
            created_at: now,
        };

        // A new invite supersedes any earlier pending one for the same address
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM team_invites WHERE email = ? AND accepted_at IS NULL")
            .bind(&invite.email)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO team_invites (id, email, role, token_hash, expires_at, accepted_at, invited_by, created_at)
            VALUES (?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(&invite.id)
        .bind(&invite.email)
        .bind(&invite.role)
        .bind(&invite.token_hash)
        .bind(&invite.expires_at)
        .bind(&invite.invited_by)
        .bind(&invite.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let accept_url = self
            .server
            .public_link(&format!("invite/accept?token={}", token));

        let email_sent = if self.email.is_enabled() {
            match self
                .email
                .send_invitation_email(
                    &invite.email,
                    &invite.role,
                    &inviter.username,
                    &accept_url,
                    self.invite_ttl.num_days(),
                )
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(invite_id = %invite.id, error = %e, "Failed to send invitation email");
                    false
                }
            }
        } else {
            false
        };

        tracing::info!(
            invite_id = %invite.id,
            role = %invite.role,
            invited_by = %inviter.id,
            "Team invite created"
        );

        Ok(CreatedInvite {
            invite,
            token,
            accept_url,
            email_sent,
        })
    }

    /// Accept an invitation, creating (or updating) the login and roster entry.
    ///
    /// All writes happen in one transaction that opens with the guarded
    /// `accepted_at IS NULL` claim.
    pub async fn accept(&self, token: &str, name: &str, password: &str) -> AuthResult<UserResponse> {
        let token = token.trim();
        let name = name.trim();
        if token.is_empty() || name.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Token, name and password are required".to_string(),
            ));
        }
        validate_name(name, "Name").map_err(AuthError::Validation)?;
        if let Some(error) = validate_password_strength(password) {
            return Err(AuthError::Validation(error));
        }

        let password_hash = self.credential.hash(password)?;
        let now = crate::db::now_timestamp();

        let token_hash = hash_token(token);
        let mut tx = self.db.begin().await?;

        let claimed = sqlx::query(
            "UPDATE team_invites SET accepted_at = ? WHERE token_hash = ? AND accepted_at IS NULL",
        )
        .bind(&now)
        .bind(&token_hash)
        .execute(&mut *tx)
        .await?;

        let invite = TeamInvite::find_by_token_hash(&mut *tx, &token_hash)
            .await?
            .ok_or_else(|| AuthError::Validation("Invalid invitation token".to_string()))?;
        if claimed.rows_affected() == 0 {
            return Err(AuthError::Conflict(
                "Invitation has already been accepted".to_string(),
            ));
        }
        // Dropping the transaction rolls the claim back
        if invite.is_expired() {
            return Err(AuthError::Expired("Invitation has expired".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO auth_users (id, username, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET
                password_hash = excluded.password_hash,
                role = excluded.role,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&invite.email)
        .bind(&password_hash)
        .bind(&invite.role)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let user: UserResponse =
            sqlx::query_as("SELECT id, username, role FROM auth_users WHERE username = ?")
                .bind(&invite.email)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query(
            r#"
            INSERT INTO team_members (id, user_id, name, email, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                user_id = excluded.user_id,
                name = excluded.name,
                role = excluded.role,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&user.id)
        .bind(name)
        .bind(&invite.email)
        .bind(&invite.role)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(invite_id = %invite.id, user_id = %user.id, "Team invite accepted");
        Ok(user)
    }
}
