//! Session and password-reset token repository

use chrono::{DateTime, Utc};

use crate::db::{db_error, DatabasePool};
use async_trait::async_trait;
use trainhub_common::Result;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Delete sessions that expired at or before `now`
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
    /// Delete password-reset tokens that expired at or before `now`
    async fn delete_expired_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Database session repository
pub struct DbSessionRepository {
    pool: DatabasePool,
}

impl DbSessionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for DbSessionRepository {
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool.pool())
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool.pool())
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }
}
