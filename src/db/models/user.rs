//! Account, session and password reset models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::db::parse_timestamp;

/// Account roles with hierarchical permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Runs the business: approves estimates, invites the team
    Owner,
    /// Schedules crews and manages leads
    Manager,
    /// Measures jobs and writes estimates
    Estimator,
    /// Field crew with read access to their projects
    Painter,
}

impl Role {
    /// Check if this role has at least the specified permission level
    pub fn has_at_least(&self, required: Role) -> bool {
        self.level() >= required.level()
    }

    /// Get the permission level (higher = more permissions)
    pub fn level(&self) -> u8 {
        match self {
            Role::Owner => 4,
            Role::Manager => 3,
            Role::Estimator => 2,
            Role::Painter => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Manager => "manager",
            Role::Estimator => "estimator",
            Role::Painter => "painter",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "manager" => Ok(Role::Manager),
            "estimator" => Ok(Role::Estimator),
            "painter" => Ok(Role::Painter),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Role::Painter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn role_enum(&self) -> Role {
        Role::from(self.role.clone())
    }

    pub async fn find_by_username(
        db: &SqlitePool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM auth_users WHERE username = ? COLLATE NOCASE")
            .bind(username.trim())
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM auth_users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn count(db: &SqlitePool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM auth_users")
            .fetch_one(db)
            .await?;
        Ok(count)
    }
}

/// The identity attached to a valid session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub role: String,
}

impl UserResponse {
    pub fn role_enum(&self) -> Role {
        Role::from(self.role.clone())
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

/// Session row joined to its owner
#[derive(Debug, Clone, FromRow)]
pub struct SessionWithUser {
    pub session_id: String,
    pub expires_at: String,
    pub user_id: String,
    pub username: String,
    pub role: String,
}

impl SessionWithUser {
    /// Unparseable expiry counts as expired
    pub fn is_expired(&self) -> bool {
        parse_timestamp(&self.expires_at).map_or(true, |at| at < chrono::Utc::now())
    }

    pub fn user(&self) -> UserResponse {
        UserResponse {
            id: self.user_id.clone(),
            username: self.username.clone(),
            role: self.role.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: String,
    pub used: bool,
    pub created_at: String,
}

impl PasswordResetToken {
    pub fn is_expired(&self) -> bool {
        parse_timestamp(&self.expires_at).map_or(true, |at| at < chrono::Utc::now())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "email")]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    #[serde(default, alias = "email", alias = "username")]
    pub email_or_username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetConfirmRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub new_password: String,
}

/// Response for setup status check
#[derive(Debug, Serialize)]
pub struct SetupStatusResponse {
    pub needs_setup: bool,
}

/// Request for initial setup
#[derive(Debug, Deserialize)]
pub struct SetupRequest {
    #[serde(default, alias = "email")]
    pub username: String,
    #[serde(default)]
    pub password: String,
}
