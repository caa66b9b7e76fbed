//! Schedule Manager - Lifecycle of scheduled emails

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use trainhub_common::types::{ScheduledEmailId, TemplateId, UserId};
use trainhub_common::{Error, Result};
use trainhub_storage::models::{CreateScheduledEmail, ScheduledEmail, ScheduledEmailStatus};
use trainhub_storage::repository::{
    EmailTemplateRepository, ScheduledEmailRepository, UserRepository,
};

/// Input for a new scheduled email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleInput {
    pub template_id: TemplateId,
    pub custom_subject: Option<String>,
    pub recipients: Vec<UserId>,
    pub scheduled_at: DateTime<Utc>,
    /// Only draft and scheduled are accepted
    pub status: ScheduledEmailStatus,
    pub created_by: UserId,
}

/// Schedule manager
pub struct ScheduleManager {
    schedules: Arc<dyn ScheduledEmailRepository>,
    templates: Arc<dyn EmailTemplateRepository>,
    users: Arc<dyn UserRepository>,
}

impl ScheduleManager {
    pub fn new(
        schedules: Arc<dyn ScheduledEmailRepository>,
        templates: Arc<dyn EmailTemplateRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            schedules,
            templates,
            users,
        }
    }

    /// Create a schedule together with its recipient rows
    pub async fn create(&self, input: CreateScheduleInput) -> Result<ScheduledEmail> {
        if !matches!(
            input.status,
            ScheduledEmailStatus::Draft | ScheduledEmailStatus::Scheduled
        ) {
            return Err(Error::Validation(format!(
                "A new schedule cannot start as {}",
                input.status
            )));
        }

        let template = self
            .templates
            .get(input.template_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Email template {}", input.template_id)))?;

        if !template.is_active {
            return Err(Error::Validation(format!(
                "Email template {} is inactive",
                template.name
            )));
        }

        let recipients = self.checked_recipients(&input.recipients).await?;

        let schedule = self
            .schedules
            .create_with_recipients(
                CreateScheduledEmail {
                    template_id: input.template_id,
                    custom_subject: input.custom_subject.filter(|s| !s.trim().is_empty()),
                    status: input.status,
                    created_by: input.created_by,
                    scheduled_at: input.scheduled_at,
                },
                &recipients,
            )
            .await?;

        info!(
            "Scheduled email {} created for {} recipients at {}",
            schedule.id,
            recipients.len(),
            schedule.scheduled_at
        );
        Ok(schedule)
    }

    /// Replace the recipient list of a schedule that has not been sent
    pub async fn update_recipients(
        &self,
        id: ScheduledEmailId,
        recipients: &[UserId],
    ) -> Result<()> {
        let schedule = self.get(id).await?;
        match schedule.status_enum() {
            Some(status) if ScheduledEmailStatus::DISPATCHABLE.contains(&status) => {}
            _ => {
                return Err(Error::StateConflict(format!(
                    "Scheduled email {} is {}",
                    id, schedule.status
                )))
            }
        }

        let recipients = self.checked_recipients(recipients).await?;
        self.schedules.replace_recipients(id, &recipients).await?;

        info!(
            "Scheduled email {} recipients replaced ({} users)",
            id,
            recipients.len()
        );
        Ok(())
    }

    /// Promote a draft to scheduled
    pub async fn schedule(&self, id: ScheduledEmailId) -> Result<()> {
        self.transition(
            id,
            &[ScheduledEmailStatus::Draft],
            ScheduledEmailStatus::Scheduled,
        )
        .await
    }

    /// Cancel a schedule that has not been sent
    pub async fn cancel(&self, id: ScheduledEmailId) -> Result<()> {
        self.transition(
            id,
            &ScheduledEmailStatus::CANCELLABLE,
            ScheduledEmailStatus::Cancelled,
        )
        .await
    }

    async fn transition(
        &self,
        id: ScheduledEmailId,
        from: &[ScheduledEmailStatus],
        to: ScheduledEmailStatus,
    ) -> Result<()> {
        if self.schedules.update_status(id, from, to).await? {
            info!("Scheduled email {} is now {}", id, to);
            return Ok(());
        }

        let current = self.get(id).await?;
        Err(Error::StateConflict(format!(
            "Scheduled email {} cannot move from {} to {}",
            id, current.status, to
        )))
    }

    async fn get(&self, id: ScheduledEmailId) -> Result<ScheduledEmail> {
        self.schedules
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Scheduled email {}", id)))
    }

    /// Deduplicate and check that every user exists
    async fn checked_recipients(&self, recipients: &[UserId]) -> Result<Vec<UserId>> {
        let mut seen = HashSet::new();
        let unique: Vec<UserId> = recipients
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        if unique.is_empty() {
            return Err(Error::Validation("At least one recipient is required".to_string()));
        }

        let found: HashSet<UserId> = self
            .users
            .list_by_ids(&unique)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();

        if let Some(missing) = unique.iter().find(|id| !found.contains(*id)) {
            return Err(Error::NotFound(format!("User {}", missing)));
        }

        Ok(unique)
    }
}
