//! Shared handler state and the seams it is built from

use async_trait::async_trait;
use std::sync::Arc;
use trainhub_common::types::SweepSummary;
use trainhub_common::Result;
use trainhub_core::{CronScheduler, DeliveryMetrics};
use trainhub_storage::DatabasePool;

/// Jobs that can be run on demand
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_scheduled_emails(&self) -> Result<SweepSummary>;
    async fn run_simulation_launches(&self) -> Result<SweepSummary>;
    async fn run_cleanup(&self) -> Result<SweepSummary>;
}

#[async_trait]
impl JobRunner for CronScheduler {
    async fn run_scheduled_emails(&self) -> Result<SweepSummary> {
        self.run_scheduled_emails_now().await
    }

    async fn run_simulation_launches(&self) -> Result<SweepSummary> {
        self.run_simulation_launches_now().await
    }

    async fn run_cleanup(&self) -> Result<SweepSummary> {
        self.run_cleanup_now().await
    }
}

/// Dependency probed by the health endpoint
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> Result<()>;
}

#[async_trait]
impl HealthCheck for DatabasePool {
    async fn check(&self) -> Result<()> {
        self.health_check().await
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobRunner>,
    pub database: Arc<dyn HealthCheck>,
    pub metrics: DeliveryMetrics,
}
