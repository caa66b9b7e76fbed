//! Scheduled email repository

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::db::{db_error, DatabasePool};
use crate::models::{
    CreateScheduledEmail, DispatchRecord, ScheduledEmail, ScheduledEmailStatus, User,
};
use async_trait::async_trait;
use trainhub_common::types::{ScheduledEmailId, UserId};
use trainhub_common::{Error, Result};

fn status_strings(statuses: &[ScheduledEmailStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.to_string()).collect()
}

/// Scheduled email repository trait
#[async_trait]
pub trait ScheduledEmailRepository: Send + Sync {
    /// Insert the schedule and its recipient rows in one transaction
    async fn create_with_recipients(
        &self,
        input: CreateScheduledEmail,
        recipients: &[UserId],
    ) -> Result<ScheduledEmail>;

    async fn get(&self, id: ScheduledEmailId) -> Result<Option<ScheduledEmail>>;

    /// Dispatchable schedules whose time has come. Draft and scheduled rows
    /// come first, oldest first; failed retries follow, least recently
    /// attempted first, so retries never crowd out new work.
    async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledEmail>>;

    /// Every user attached to the schedule, active or not
    async fn list_recipients(&self, id: ScheduledEmailId) -> Result<Vec<User>>;

    async fn replace_recipients(&self, id: ScheduledEmailId, recipients: &[UserId]) -> Result<()>;

    /// Move to `to` only if the current status is one of `from`.
    /// Returns false when nothing changed.
    async fn update_status(
        &self,
        id: ScheduledEmailId,
        from: &[ScheduledEmailStatus],
        to: ScheduledEmailStatus,
    ) -> Result<bool>;

    /// Persist a dispatch outcome unless the schedule left the
    /// dispatchable states meanwhile. Returns false when skipped.
    async fn record_dispatch(
        &self,
        id: ScheduledEmailId,
        record: DispatchRecord,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Database scheduled email repository
pub struct DbScheduledEmailRepository {
    pool: DatabasePool,
}

impl DbScheduledEmailRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduledEmailRepository for DbScheduledEmailRepository {
    async fn create_with_recipients(
        &self,
        input: CreateScheduledEmail,
        recipients: &[UserId],
    ) -> Result<ScheduledEmail> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut tx = self.pool.pool().begin().await.map_err(db_error)?;

        let schedule = sqlx::query_as::<_, ScheduledEmail>(
            r#"
            INSERT INTO scheduled_emails (
                id, template_id, custom_subject, status, created_by, scheduled_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.template_id)
        .bind(&input.custom_subject)
        .bind(input.status.to_string())
        .bind(input.created_by)
        .bind(input.scheduled_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO scheduled_email_recipients (scheduled_email_id, user_id)
            SELECT $1, user_id FROM UNNEST($2::uuid[]) AS t(user_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(recipients)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(schedule)
    }

    async fn get(&self, id: ScheduledEmailId) -> Result<Option<ScheduledEmail>> {
        sqlx::query_as::<_, ScheduledEmail>("SELECT * FROM scheduled_emails WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_error)
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledEmail>> {
        sqlx::query_as::<_, ScheduledEmail>(
            r#"
            SELECT * FROM scheduled_emails
            WHERE status = ANY($1)
              AND scheduled_at <= $2
            ORDER BY
                (status = 'failed') ASC,
                COALESCE(last_dispatched_at, scheduled_at) ASC,
                scheduled_at ASC
            LIMIT $3
            "#,
        )
        .bind(status_strings(&ScheduledEmailStatus::DISPATCHABLE))
        .bind(now)
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_error)
    }

    async fn list_recipients(&self, id: ScheduledEmailId) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN scheduled_email_recipients r ON r.user_id = u.id
            WHERE r.scheduled_email_id = $1
            ORDER BY u.email
            "#,
        )
        .bind(id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_error)
    }

    async fn replace_recipients(&self, id: ScheduledEmailId, recipients: &[UserId]) -> Result<()> {
        let mut tx = self.pool.pool().begin().await.map_err(db_error)?;

        sqlx::query("DELETE FROM scheduled_email_recipients WHERE scheduled_email_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO scheduled_email_recipients (scheduled_email_id, user_id)
            SELECT $1, user_id FROM UNNEST($2::uuid[]) AS t(user_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(recipients)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query("UPDATE scheduled_emails SET updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn update_status(
        &self,
        id: ScheduledEmailId,
        from: &[ScheduledEmailStatus],
        to: ScheduledEmailStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_emails SET
                status = $3,
                updated_at = $4
            WHERE id = $1 AND status = ANY($2)
            "#,
        )
        .bind(id)
        .bind(status_strings(from))
        .bind(to.to_string())
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_dispatch(
        &self,
        id: ScheduledEmailId,
        record: DispatchRecord,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.pool().begin().await.map_err(db_error)?;

        let row = sqlx::query("SELECT status FROM scheduled_emails WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?;

        let Some(row) = row else {
            return Err(Error::NotFound(format!("Scheduled email {}", id)));
        };

        let current: String = row.try_get("status").map_err(db_error)?;
        let dispatchable = current
            .parse::<ScheduledEmailStatus>()
            .map(|s| ScheduledEmailStatus::DISPATCHABLE.contains(&s))
            .unwrap_or(false);

        if !dispatchable {
            tx.rollback().await.map_err(db_error)?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE scheduled_emails SET
                status = $2,
                sent_count = $3,
                failed_count = $4,
                last_error = $5,
                last_dispatched_at = $6,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(record.status.to_string())
        .bind(record.sent_count)
        .bind(record.failed_count)
        .bind(&record.last_error)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(true)
    }
}
