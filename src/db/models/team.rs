//! Team member and invitation models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::db::parse_timestamp;

/// A person on the crew roster, linked to a login once they accept an invite
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamMember {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TeamMember {
    pub async fn list_all(db: &SqlitePool) -> Result<Vec<TeamMember>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM team_members
            ORDER BY
                CASE role
                    WHEN 'owner' THEN 1
                    WHEN 'manager' THEN 2
                    WHEN 'estimator' THEN 3
                    ELSE 4
                END,
                name ASC
            "#,
        )
        .fetch_all(db)
        .await
    }

    pub async fn find_by_email(
        db: &SqlitePool,
        email: &str,
    ) -> Result<Option<TeamMember>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM team_members WHERE email = ?")
            .bind(email)
            .fetch_optional(db)
            .await
    }
}

/// Email invitation to join the team
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamInvite {
    pub id: String,
    pub email: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: String,
    pub accepted_at: Option<String>,
    pub invited_by: Option<String>,
    pub created_at: String,
}

impl TeamInvite {
    /// Check if the invitation has expired
    pub fn is_expired(&self) -> bool {
        // Treat parse errors as expired
        parse_timestamp(&self.expires_at).map_or(true, |at| at < chrono::Utc::now())
    }

    /// Look up an invite by token hash on a pool or inside a transaction
    pub async fn find_by_token_hash<'e, E>(
        executor: E,
        token_hash: &str,
    ) -> Result<Option<TeamInvite>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as("SELECT * FROM team_invites WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(executor)
            .await
    }

    /// Invitations that can still be accepted
    pub async fn list_pending(db: &SqlitePool) -> Result<Vec<TeamInvite>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM team_invites WHERE accepted_at IS NULL AND expires_at > ? ORDER BY created_at DESC",
        )
        .bind(crate::db::now_timestamp())
        .fetch_all(db)
        .await
    }
}

/// Request to invite someone by email
#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

/// Invite plus the link that was (or would have been) emailed
#[derive(Debug, Serialize)]
pub struct CreateInviteResponse {
    pub success: bool,
    pub invite: TeamInvite,
    pub accept_url: String,
    pub email_sent: bool,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInviteRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}
