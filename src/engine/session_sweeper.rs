//! Background purge of dead auth rows.
//!
//! Expired sessions are also removed lazily when presented, so this only
//! keeps the tables from growing. Reset tokens are kept for a grace period
//! after they expire or are used, so a late confirm still gets the precise
//! "expired" or "already used" answer instead of "invalid".

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::{interval, Duration};

use crate::db::{timestamp, DbPool};

/// How long spent reset tokens stay around after expiry
const RESET_TOKEN_GRACE_HOURS: i64 = 24;

pub struct SessionSweeper {
    db: DbPool,
}

impl SessionSweeper {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Run a single sweep
    pub async fn run_sweep(&self) -> Result<SweepStats> {
        let now = Utc::now();

        let sessions = sqlx::query("DELETE FROM auth_sessions WHERE expires_at < ?")
            .bind(timestamp(now))
            .execute(&self.db)
            .await?
            .rows_affected();

        let grace_cutoff = timestamp(now - ChronoDuration::hours(RESET_TOKEN_GRACE_HOURS));
        let reset_tokens = sqlx::query(
            "DELETE FROM password_reset_tokens WHERE expires_at < ? OR (used = 1 AND created_at < ?)",
        )
        .bind(&grace_cutoff)
        .bind(&grace_cutoff)
        .execute(&self.db)
        .await?
        .rows_affected();

        let stats = SweepStats {
            sessions_removed: sessions,
            reset_tokens_removed: reset_tokens,
        };

        if stats.sessions_removed > 0 || stats.reset_tokens_removed > 0 {
            tracing::info!(
                sessions = stats.sessions_removed,
                reset_tokens = stats.reset_tokens_removed,
                "Auth sweep completed"
            );
        } else {
            tracing::debug!("Auth sweep found nothing to remove");
        }

        Ok(stats)
    }
}

/// Statistics from a sweep
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub sessions_removed: u64,
    pub reset_tokens_removed: u64,
}

/// Spawn the background sweep task
pub fn spawn_session_sweeper(db: DbPool, interval_secs: u64) {
    if interval_secs == 0 {
        tracing::info!("Auth sweeper is disabled");
        return;
    }

    tracing::info!(interval_secs = interval_secs, "Starting auth sweeper");

    let sweeper = SessionSweeper::new(db);

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick.tick().await;
            if let Err(e) = sweeper.run_sweep().await {
                tracing::error!(error = %e, "Auth sweep failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(db: &DbPool) {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO auth_users (id, username, password_hash, role, created_at, updated_at) VALUES ('u1', 'dana', 'x', 'owner', ?, ?)",
        )
        .bind(timestamp(now))
        .bind(timestamp(now))
        .execute(db)
        .await
        .unwrap();

        let sessions = [
            ("s-live", now + ChronoDuration::days(1)),
            ("s-dead", now - ChronoDuration::minutes(1)),
        ];
        for (id, expires) in sessions {
            sqlx::query(
                "INSERT INTO auth_sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, 'u1', ?, ?, ?)",
            )
            .bind(id)
            .bind(format!("hash-{}", id))
            .bind(timestamp(expires))
            .bind(timestamp(now))
            .execute(db)
            .await
            .unwrap();
        }

        let tokens = [
            ("r-fresh", now + ChronoDuration::hours(1), false, now),
            ("r-just-expired", now - ChronoDuration::hours(1), false, now - ChronoDuration::hours(2)),
            ("r-long-expired", now - ChronoDuration::hours(30), false, now - ChronoDuration::hours(31)),
            ("r-used-old", now + ChronoDuration::hours(1), true, now - ChronoDuration::hours(25)),
        ];
        for (id, expires, used, created) in tokens {
            sqlx::query(
                "INSERT INTO password_reset_tokens (id, user_id, token_hash, expires_at, used, created_at) VALUES (?, 'u1', ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(format!("hash-{}", id))
            .bind(timestamp(expires))
            .bind(used)
            .bind(timestamp(created))
            .execute(db)
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_sweep_removes_only_dead_rows() {
        let db = crate::db::connect_in_memory().await.unwrap();
        seed(&db).await;

        let stats = SessionSweeper::new(db.clone()).run_sweep().await.unwrap();
        assert_eq!(
            stats,
            SweepStats {
                sessions_removed: 1,
                reset_tokens_removed: 2,
            }
        );

        let mut remaining: Vec<String> = sqlx::query_scalar("SELECT id FROM password_reset_tokens")
            .fetch_all(&db)
            .await
            .unwrap();
        remaining.sort();
        assert_eq!(remaining, vec!["r-fresh", "r-just-expired"]);

        let sessions: Vec<String> = sqlx::query_scalar("SELECT id FROM auth_sessions")
            .fetch_all(&db)
            .await
            .unwrap();
        assert_eq!(sessions, vec!["s-live"]);

        let again = SessionSweeper::new(db).run_sweep().await.unwrap();
        assert_eq!(again, SweepStats::default());
    }
}
