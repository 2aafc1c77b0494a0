mod models;

pub use models::*;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub type DbPool = SqlitePool;

/// Format a timestamp the way every table stores it.
///
/// Second precision with a `Z` suffix keeps the text form lexically ordered,
/// so `expires_at < ?` comparisons in SQL agree with chrono.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}

/// Parse a stored timestamp, `None` when the column holds garbage
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("brushwork.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Initializing database at {}", db_path.display());

    // Writers queue on the database lock instead of failing with SQLITE_BUSY
    let options = SqliteConnectOptions::from_str(&db_url)?.busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Enable WAL mode for better concurrency
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Open a private in-memory database with the schema applied.
///
/// Every connection to `sqlite::memory:` sees its own database, so the pool is
/// pinned to a single connection that never expires.
pub async fn connect_in_memory() -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let found: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: accounts, sessions, reset tokens
    if !table_exists(pool, "auth_users").await? {
        execute_sql(pool, include_str!("../../migrations/001_auth.sql")).await?;
    }

    // Migration 002: team members and invites
    if !table_exists(pool, "team_invites").await? {
        execute_sql(pool, include_str!("../../migrations/002_team.sql")).await?;
    }

    // Migration 003: leads, estimates, projects
    if !table_exists(pool, "estimates").await? {
        execute_sql(pool, include_str!("../../migrations/003_estimates.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_schema_is_created() {
        let pool = connect_in_memory().await.unwrap();
        for table in [
            "auth_users",
            "auth_sessions",
            "password_reset_tokens",
            "team_members",
            "team_invites",
            "leads",
            "estimates",
            "projects",
        ] {
            assert!(table_exists(&pool, table).await.unwrap(), "missing {}", table);
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_database_init() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init(dir.path()).await.unwrap();
        assert!(dir.path().join("brushwork.db").exists());
        pool.close().await;
    }

    #[tokio::test]
    async fn test_close_checkpoints_and_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init(dir.path()).await.unwrap();
        sqlx::query(
            "INSERT INTO leads (id, name, status, created_at, updated_at) VALUES ('l1', 'Dana', 'new', ?, ?)",
        )
        .bind(now_timestamp())
        .bind(now_timestamp())
        .execute(&pool)
        .await
        .unwrap();

        pool.close().await;
        assert!(!dir.path().join("brushwork.db-wal").exists());

        let reopened = init(dir.path()).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
            .fetch_one(&reopened)
            .await
            .unwrap();
        assert_eq!(count, 1);
        reopened.close().await;
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::seconds(61);
        assert!(timestamp(earlier) < timestamp(later));
        assert!(timestamp(earlier).ends_with('Z'));
        let parsed = parse_timestamp(&timestamp(later)).unwrap();
        assert_eq!(parsed.timestamp(), later.timestamp());
        assert!(parse_timestamp("not a date").is_none());
    }
}
