//! Attack Simulation Dispatcher - Launches due phishing simulations

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use trainhub_common::types::SweepSummary;
use trainhub_common::{Error, Result};
use trainhub_storage::models::{LaunchRecord, LaunchStatus, ScheduledSimulation, SimulationStatus};
use trainhub_storage::repository::{BundleRepository, SimulationRepository};

use super::launcher::{CampaignLauncher, LaunchTarget};
use crate::delivery::RecipientResolver;
use crate::metrics::DeliveryMetrics;

/// Result of processing one simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Launched { launched: usize, failed: usize },
    Failed { reason: String },
    /// Cancelled or already handled while in flight
    Skipped,
}

/// Attack simulation dispatcher
pub struct AttackSimulationDispatcher {
    simulations: Arc<dyn SimulationRepository>,
    bundles: Arc<dyn BundleRepository>,
    resolver: Arc<RecipientResolver>,
    launcher: Arc<dyn CampaignLauncher>,
    metrics: Option<DeliveryMetrics>,
    concurrency_limit: usize,
    batch_size: i64,
}

impl AttackSimulationDispatcher {
    pub fn new(
        simulations: Arc<dyn SimulationRepository>,
        bundles: Arc<dyn BundleRepository>,
        resolver: Arc<RecipientResolver>,
        launcher: Arc<dyn CampaignLauncher>,
    ) -> Self {
        Self {
            simulations,
            bundles,
            resolver,
            launcher,
            metrics: None,
            concurrency_limit: 4,
            batch_size: 100,
        }
    }

    /// Set concurrency limit
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    /// Set batch size
    pub fn with_batch_size(mut self, size: i64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: DeliveryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run one sweep now
    pub async fn run(self: &Arc<Self>) -> Result<SweepSummary> {
        self.run_at(Utc::now()).await
    }

    /// Run one sweep treating `now` as the current time
    pub async fn run_at(self: &Arc<Self>, now: DateTime<Utc>) -> Result<SweepSummary> {
        let started = Instant::now();
        let due = self.simulations.list_due(now, self.batch_size).await?;
        let mut summary = SweepSummary::default();

        if due.is_empty() {
            debug!("No simulation launches due");
            return Ok(summary);
        }

        info!("Launching {} due simulations", due.len());

        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut tasks = JoinSet::new();

        for simulation in due {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;
            let this = Arc::clone(self);

            tasks.spawn(async move {
                let _permit = permit;
                this.process(simulation, now).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(LaunchOutcome::Launched { .. }) => summary.record(true),
                Ok(LaunchOutcome::Failed { .. }) => summary.record(false),
                Ok(LaunchOutcome::Skipped) => summary.record_skipped(),
                Err(e) => {
                    error!("Simulation launch task error: {}", e);
                    summary.record(false);
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.observe_sweep("simulation_launches", started.elapsed().as_secs_f64());
        }

        info!(
            "Simulation sweep finished: {} processed, {} launched, {} failed",
            summary.processed, summary.success, summary.failed
        );
        Ok(summary)
    }

    /// Launch one simulation and persist its outcome.
    ///
    /// Infrastructure errors leave the simulation pending so the next sweep
    /// picks it up again.
    pub async fn process(&self, simulation: ScheduledSimulation, now: DateTime<Utc>) -> LaunchOutcome {
        let record = match self.launch(&simulation).await {
            Ok(record) => record,
            Err(e) if e.is_retryable() => {
                error!(
                    "Simulation {} could not be prepared, leaving it pending: {}",
                    simulation.id, e
                );
                return LaunchOutcome::Failed {
                    reason: e.to_string(),
                };
            }
            Err(e) => {
                warn!("Simulation {} launch failed: {}", simulation.id, e);
                LaunchRecord {
                    launch_status: LaunchStatus::LaunchFailed,
                    status: None,
                    launched_count: 0,
                    failed_count: 0,
                    last_error: Some(e.to_string()),
                }
            }
        };

        match self
            .simulations
            .record_launch(simulation.id, record.clone(), now)
            .await
        {
            Ok(true) => match record.launch_status {
                LaunchStatus::Launched => LaunchOutcome::Launched {
                    launched: record.launched_count as usize,
                    failed: record.failed_count as usize,
                },
                _ => LaunchOutcome::Failed {
                    reason: record.last_error.unwrap_or_default(),
                },
            },
            Ok(false) => {
                info!(
                    "Simulation {} changed during launch; outcome discarded",
                    simulation.id
                );
                LaunchOutcome::Skipped
            }
            Err(e) => {
                error!(
                    "Failed to persist launch outcome of simulation {}: {}",
                    simulation.id, e
                );
                LaunchOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn launch(&self, simulation: &ScheduledSimulation) -> Result<LaunchRecord> {
        if self.bundles.get(simulation.bundle_id).await?.is_none() {
            return Err(Error::Configuration(format!(
                "Bundle {} not found",
                simulation.bundle_id
            )));
        }

        let targets = self.resolver.resolve_groups(&simulation.group_ids).await?;
        if targets.is_empty() {
            return Err(Error::Configuration("No active targets".to_string()));
        }

        let mut launched = 0usize;
        let mut failed = 0usize;
        let mut last_error = None;

        for user in &targets {
            let target = LaunchTarget {
                simulation_id: simulation.id,
                simulation_name: simulation.name.clone(),
                campaign_type: simulation.campaign_type.clone(),
                bundle_id: simulation.bundle_id,
                user_id: user.id,
                email: user.email.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
            };

            let ok = match self.launcher.launch(&target).await {
                Ok(()) => {
                    launched += 1;
                    true
                }
                Err(e) => {
                    warn!(
                        "Simulation {} launch for {} failed: {}",
                        simulation.id, user.email, e
                    );
                    failed += 1;
                    last_error = Some(e.to_string());
                    false
                }
            };

            if let Some(metrics) = &self.metrics {
                metrics.record_simulation_target(ok);
            }
        }

        info!(
            "Simulation {}: {} launched, {} failed of {} targets",
            simulation.id,
            launched,
            failed,
            targets.len()
        );

        Ok(if launched > 0 {
            LaunchRecord {
                launch_status: LaunchStatus::Launched,
                status: Some(SimulationStatus::Completed),
                launched_count: launched as i32,
                failed_count: failed as i32,
                last_error,
            }
        } else {
            LaunchRecord {
                launch_status: LaunchStatus::LaunchFailed,
                status: None,
                launched_count: 0,
                failed_count: failed as i32,
                last_error,
            }
        })
    }
}
