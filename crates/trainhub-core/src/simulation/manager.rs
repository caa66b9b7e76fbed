//! Simulation Manager - Lifecycle of scheduled attack simulations

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use trainhub_common::types::{BundleId, GroupId, SimulationId, UserId};
use trainhub_common::{Error, Result};
use trainhub_storage::models::{
    CreateSimulation, LaunchStatus, ScheduledSimulation, SimulationStatus, UpdateSimulation,
};
use trainhub_storage::repository::{BundleRepository, SimulationRepository};

use super::launch_time::resolve_launch_at;

/// Input for a new simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSimulationInput {
    pub name: String,
    pub group_ids: Vec<GroupId>,
    pub bundle_id: BundleId,
    pub campaign_type: String,
    pub launch_date: NaiveDate,
    pub launch_time: NaiveTime,
    pub timezone: String,
    /// "Deliver Immediately" or "Schedule Later"
    pub launch_status: LaunchStatus,
    /// Draft or scheduled
    pub status: SimulationStatus,
    pub created_by: UserId,
}

/// Full replacement of a simulation's editable fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSimulationInput {
    pub name: String,
    pub group_ids: Vec<GroupId>,
    pub bundle_id: BundleId,
    pub campaign_type: String,
    pub launch_date: NaiveDate,
    pub launch_time: NaiveTime,
    pub timezone: String,
    pub launch_status: LaunchStatus,
}

/// Simulation manager
pub struct SimulationManager {
    simulations: Arc<dyn SimulationRepository>,
    bundles: Arc<dyn BundleRepository>,
}

impl SimulationManager {
    pub fn new(
        simulations: Arc<dyn SimulationRepository>,
        bundles: Arc<dyn BundleRepository>,
    ) -> Self {
        Self {
            simulations,
            bundles,
        }
    }

    pub async fn create(&self, input: CreateSimulationInput) -> Result<ScheduledSimulation> {
        if input.name.trim().is_empty() {
            return Err(Error::Validation("Simulation name is required".to_string()));
        }
        if !matches!(
            input.status,
            SimulationStatus::Draft | SimulationStatus::Scheduled
        ) {
            return Err(Error::Validation(format!(
                "A new simulation cannot start as {}",
                input.status
            )));
        }

        self.check_bundle(input.bundle_id).await?;

        let launch_at = resolve_launch_at(
            input.launch_status,
            input.launch_date,
            input.launch_time,
            &input.timezone,
            Utc::now(),
        )?;

        let simulation = self
            .simulations
            .create(CreateSimulation {
                name: input.name,
                group_ids: dedup_groups(&input.group_ids),
                bundle_id: input.bundle_id,
                campaign_type: input.campaign_type,
                launch_date: input.launch_date,
                launch_time: input.launch_time,
                timezone: input.timezone,
                launch_at,
                status: input.status,
                launch_status: input.launch_status,
                created_by: input.created_by,
            })
            .await?;

        info!(
            "Simulation {} created, due at {} ({})",
            simulation.id, simulation.launch_at, simulation.launch_status
        );
        Ok(simulation)
    }

    /// Update a simulation. Once launched, its groups and bundle are frozen
    /// and only the name and campaign type can change.
    pub async fn update(
        &self,
        id: SimulationId,
        input: UpdateSimulationInput,
    ) -> Result<ScheduledSimulation> {
        let existing = self.get(id).await?;

        if existing.status_enum() == Some(SimulationStatus::Cancelled) {
            return Err(Error::StateConflict(format!("Simulation {} is cancelled", id)));
        }

        let expected = existing.launch_status_enum().ok_or_else(|| {
            Error::Internal(format!(
                "Simulation {} has unknown launch status {}",
                id, existing.launch_status
            ))
        })?;

        let changes = if existing.targets_mutable() {
            self.check_bundle(input.bundle_id).await?;
            let launch_at = resolve_launch_at(
                input.launch_status,
                input.launch_date,
                input.launch_time,
                &input.timezone,
                Utc::now(),
            )?;

            UpdateSimulation {
                name: input.name,
                group_ids: dedup_groups(&input.group_ids),
                bundle_id: input.bundle_id,
                campaign_type: input.campaign_type,
                launch_date: input.launch_date,
                launch_time: input.launch_time,
                timezone: input.timezone,
                launch_at,
                launch_status: input.launch_status,
            }
        } else {
            if dedup_groups(&input.group_ids) != dedup_groups(&existing.group_ids)
                || input.bundle_id != existing.bundle_id
            {
                return Err(Error::StateConflict(format!(
                    "Simulation {} was already executed ({}); groups and bundle cannot change",
                    id, existing.launch_status
                )));
            }

            UpdateSimulation {
                name: input.name,
                group_ids: existing.group_ids.clone(),
                bundle_id: existing.bundle_id,
                campaign_type: input.campaign_type,
                launch_date: existing.launch_date,
                launch_time: existing.launch_time,
                timezone: existing.timezone.clone(),
                launch_at: existing.launch_at,
                launch_status: expected,
            }
        };

        let updated = self
            .simulations
            .update(id, expected, changes)
            .await?
            .ok_or_else(|| {
                Error::StateConflict(format!("Simulation {} changed concurrently", id))
            })?;

        info!("Simulation {} updated", id);
        Ok(updated)
    }

    pub async fn cancel(&self, id: SimulationId) -> Result<()> {
        let cancelled = self
            .simulations
            .update_status(
                id,
                &[SimulationStatus::Draft, SimulationStatus::Scheduled],
                SimulationStatus::Cancelled,
            )
            .await?;

        if cancelled {
            info!("Simulation {} cancelled", id);
            return Ok(());
        }

        let current = self.get(id).await?;
        Err(Error::StateConflict(format!(
            "Simulation {} cannot be cancelled from {}",
            id, current.status
        )))
    }

    async fn get(&self, id: SimulationId) -> Result<ScheduledSimulation> {
        self.simulations
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Simulation {}", id)))
    }

    async fn check_bundle(&self, id: BundleId) -> Result<()> {
        match self.bundles.get(id).await? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("Bundle {}", id))),
        }
    }
}

fn dedup_groups(groups: &[GroupId]) -> Vec<GroupId> {
    groups
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
