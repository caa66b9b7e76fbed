//! Manual job triggers
//!
//! Each trigger waits for an in-flight timer run of the same job and
//! then runs one sweep, returning its counts.

use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::info;
use trainhub_common::types::SweepSummary;

use crate::error::ApiError;
use crate::state::AppState;

fn log_summary(job: &str, summary: &SweepSummary) {
    info!(
        "Manual {} run finished: {} processed, {} succeeded, {} failed",
        job, summary.processed, summary.success, summary.failed
    );
}

pub async fn run_scheduled_emails(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepSummary>, ApiError> {
    let summary = state.jobs.run_scheduled_emails().await?;
    log_summary("scheduled_emails", &summary);
    Ok(Json(summary))
}

pub async fn run_simulation_launches(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepSummary>, ApiError> {
    let summary = state.jobs.run_simulation_launches().await?;
    log_summary("simulation_launches", &summary);
    Ok(Json(summary))
}

pub async fn run_cleanup(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepSummary>, ApiError> {
    let summary = state.jobs.run_cleanup().await?;
    log_summary("cleanup", &summary);
    Ok(Json(summary))
}
