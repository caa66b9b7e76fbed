//! Scheduled attack simulation repository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{db_error, DatabasePool};
use crate::models::{
    CreateSimulation, LaunchRecord, LaunchStatus, ScheduledSimulation, SimulationStatus,
    UpdateSimulation,
};
use async_trait::async_trait;
use trainhub_common::types::SimulationId;
use trainhub_common::Result;

fn pending_launch_statuses() -> Vec<String> {
    LaunchStatus::PENDING.iter().map(|s| s.to_string()).collect()
}

/// Simulation repository trait
#[async_trait]
pub trait SimulationRepository: Send + Sync {
    async fn create(&self, input: CreateSimulation) -> Result<ScheduledSimulation>;

    async fn get(&self, id: SimulationId) -> Result<Option<ScheduledSimulation>>;

    /// Replace editable fields if the launch status is still `expected`.
    /// Returns `None` when the row changed underneath.
    async fn update(
        &self,
        id: SimulationId,
        expected: LaunchStatus,
        input: UpdateSimulation,
    ) -> Result<Option<ScheduledSimulation>>;

    /// Pending launches whose instant has come, oldest first
    async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledSimulation>>;

    async fn update_status(
        &self,
        id: SimulationId,
        from: &[SimulationStatus],
        to: SimulationStatus,
    ) -> Result<bool>;

    /// Persist a launch outcome if the row is still pending and not
    /// cancelled. Returns false when skipped.
    async fn record_launch(
        &self,
        id: SimulationId,
        record: LaunchRecord,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Database simulation repository
pub struct DbSimulationRepository {
    pool: DatabasePool,
}

impl DbSimulationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SimulationRepository for DbSimulationRepository {
    async fn create(&self, input: CreateSimulation) -> Result<ScheduledSimulation> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        sqlx::query_as::<_, ScheduledSimulation>(
            r#"
            INSERT INTO scheduled_simulations (
                id, name, group_ids, bundle_id, campaign_type, launch_date, launch_time,
                timezone, launch_at, status, launch_status, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.group_ids)
        .bind(input.bundle_id)
        .bind(&input.campaign_type)
        .bind(input.launch_date)
        .bind(input.launch_time)
        .bind(&input.timezone)
        .bind(input.launch_at)
        .bind(input.status.to_string())
        .bind(input.launch_status.to_string())
        .bind(input.created_by)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_error)
    }

    async fn get(&self, id: SimulationId) -> Result<Option<ScheduledSimulation>> {
        sqlx::query_as::<_, ScheduledSimulation>(
            "SELECT * FROM scheduled_simulations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(db_error)
    }

    async fn update(
        &self,
        id: SimulationId,
        expected: LaunchStatus,
        input: UpdateSimulation,
    ) -> Result<Option<ScheduledSimulation>> {
        sqlx::query_as::<_, ScheduledSimulation>(
            r#"
            UPDATE scheduled_simulations SET
                name = $3,
                group_ids = $4,
                bundle_id = $5,
                campaign_type = $6,
                launch_date = $7,
                launch_time = $8,
                timezone = $9,
                launch_at = $10,
                launch_status = $11,
                updated_at = $12
            WHERE id = $1 AND launch_status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected.to_string())
        .bind(&input.name)
        .bind(&input.group_ids)
        .bind(input.bundle_id)
        .bind(&input.campaign_type)
        .bind(input.launch_date)
        .bind(input.launch_time)
        .bind(&input.timezone)
        .bind(input.launch_at)
        .bind(input.launch_status.to_string())
        .bind(Utc::now())
        .fetch_optional(self.pool.pool())
        .await
        .map_err(db_error)
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledSimulation>> {
        sqlx::query_as::<_, ScheduledSimulation>(
            r#"
            SELECT * FROM scheduled_simulations
            WHERE launch_status = ANY($1)
              AND status IN ('draft', 'scheduled')
              AND launch_at <= $2
            ORDER BY launch_at ASC
            LIMIT $3
            "#,
        )
        .bind(pending_launch_statuses())
        .bind(now)
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_error)
    }

    async fn update_status(
        &self,
        id: SimulationId,
        from: &[SimulationStatus],
        to: SimulationStatus,
    ) -> Result<bool> {
        let from: Vec<String> = from.iter().map(|s| s.to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE scheduled_simulations SET
                status = $3,
                updated_at = $4
            WHERE id = $1 AND status = ANY($2)
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to.to_string())
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_launch(
        &self,
        id: SimulationId,
        record: LaunchRecord,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_simulations SET
                launch_status = $3,
                status = COALESCE($4, status),
                launched_count = $5,
                failed_count = $6,
                last_error = $7,
                launched_at = $8,
                updated_at = $8
            WHERE id = $1
              AND launch_status = ANY($2)
              AND status <> 'cancelled'
            "#,
        )
        .bind(id)
        .bind(pending_launch_statuses())
        .bind(record.launch_status.to_string())
        .bind(record.status.map(|s| s.to_string()))
        .bind(record.launched_count)
        .bind(record.failed_count)
        .bind(&record.last_error)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }
}
