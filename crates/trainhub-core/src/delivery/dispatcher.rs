//! Scheduled Email Dispatcher - Sends due scheduled emails
//!
//! One sweep loads every dispatchable schedule whose time has come and
//! processes them concurrently, bounded by a semaphore. Each schedule is
//! isolated: its failure is written to its own row and never aborts the
//! sweep. Failed schedules stay due and are attempted again by later
//! sweeps, after any draft or scheduled work in the same batch.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use trainhub_common::types::SweepSummary;
use trainhub_common::{Error, Result};
use trainhub_storage::models::{
    DispatchRecord, EmailTemplate, ScheduledEmail, ScheduledEmailStatus, User,
};
use trainhub_storage::repository::{EmailTemplateRepository, ScheduledEmailRepository};

use super::recipients::RecipientResolver;
use super::sender::EmailSender;
use super::template::{TemplateRenderer, TemplateVars};
use crate::metrics::DeliveryMetrics;

/// Result of processing one schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// At least one recipient was reached
    Sent { sent: usize, failed: usize },
    /// Nothing was delivered
    Failed { reason: String },
    /// The schedule was cancelled while in flight; outcome discarded
    Skipped,
}

/// Scheduled email dispatcher
pub struct ScheduledEmailDispatcher {
    schedules: Arc<dyn ScheduledEmailRepository>,
    templates: Arc<dyn EmailTemplateRepository>,
    resolver: Arc<RecipientResolver>,
    sender: Arc<dyn EmailSender>,
    renderer: TemplateRenderer,
    metrics: Option<DeliveryMetrics>,
    /// Maximum schedules processed at once
    concurrency_limit: usize,
    /// Maximum due schedules fetched per sweep
    batch_size: i64,
}

impl ScheduledEmailDispatcher {
    pub fn new(
        schedules: Arc<dyn ScheduledEmailRepository>,
        templates: Arc<dyn EmailTemplateRepository>,
        resolver: Arc<RecipientResolver>,
        sender: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            schedules,
            templates,
            resolver,
            sender,
            renderer: TemplateRenderer::new(),
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
        let due = self.schedules.list_due(now, self.batch_size).await?;
        let mut summary = SweepSummary::default();

        if due.is_empty() {
            debug!("No scheduled emails due");
            return Ok(summary);
        }

        info!("Dispatching {} due scheduled emails", due.len());

        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut tasks = JoinSet::new();

        for schedule in due {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;
            let this = Arc::clone(self);

            tasks.spawn(async move {
                let _permit = permit;
                this.process(schedule, now).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(DispatchOutcome::Sent { .. }) => summary.record(true),
                Ok(DispatchOutcome::Failed { .. }) => summary.record(false),
                Ok(DispatchOutcome::Skipped) => summary.record_skipped(),
                Err(e) => {
                    error!("Scheduled email task error: {}", e);
                    summary.record(false);
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.observe_sweep("scheduled_emails", started.elapsed().as_secs_f64());
        }

        info!(
            "Scheduled email sweep finished: {} processed, {} sent, {} failed",
            summary.processed, summary.success, summary.failed
        );
        Ok(summary)
    }

    /// Deliver one schedule and persist its outcome
    pub async fn process(&self, schedule: ScheduledEmail, now: DateTime<Utc>) -> DispatchOutcome {
        let record = match self.deliver(&schedule).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Scheduled email {} failed: {}", schedule.id, e);
                DispatchRecord {
                    status: ScheduledEmailStatus::Failed,
                    sent_count: 0,
                    failed_count: 0,
                    last_error: Some(e.to_string()),
                }
            }
        };

        let outcome = match self
            .schedules
            .record_dispatch(schedule.id, record.clone(), now)
            .await
        {
            Ok(true) => match record.status {
                ScheduledEmailStatus::Sent => DispatchOutcome::Sent {
                    sent: record.sent_count as usize,
                    failed: record.failed_count as usize,
                },
                _ => DispatchOutcome::Failed {
                    reason: record.last_error.unwrap_or_default(),
                },
            },
            Ok(false) => {
                info!(
                    "Scheduled email {} was cancelled during dispatch; outcome discarded",
                    schedule.id
                );
                DispatchOutcome::Skipped
            }
            Err(e) => {
                error!(
                    "Failed to persist dispatch outcome of scheduled email {}: {}",
                    schedule.id, e
                );
                DispatchOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        if let Some(metrics) = &self.metrics {
            let label = match &outcome {
                DispatchOutcome::Sent { .. } => "sent",
                DispatchOutcome::Failed { .. } => "failed",
                DispatchOutcome::Skipped => "skipped",
            };
            metrics.record_schedule(label);
        }

        outcome
    }

    async fn deliver(&self, schedule: &ScheduledEmail) -> Result<DispatchRecord> {
        let template = self
            .templates
            .get(schedule.template_id)
            .await?
            .ok_or_else(|| {
                Error::Configuration(format!("Email template {} not found", schedule.template_id))
            })?;

        if !template.is_active {
            return Err(Error::Configuration(format!(
                "Email template {} is inactive",
                template.name
            )));
        }

        let recipients = self.resolver.resolve(schedule).await?;
        if recipients.is_empty() {
            return Err(Error::Configuration("No active recipients".to_string()));
        }

        let (subject, subject_vars) = self
            .renderer
            .resolve_subject(&template.subject, schedule.custom_subject.as_deref());

        let mut sent = 0usize;
        let mut failed = 0usize;
        let mut last_error = None;

        for user in &recipients {
            let vars = recipient_vars(&subject_vars, &template, schedule, user);
            let subject = self.renderer.render(&subject, &vars);
            let body = self.renderer.render(&template.body, &vars);

            let delivered = match self.sender.send(&user.email, &subject, &body).await {
                Ok(()) => {
                    debug!("Scheduled email {} sent to {}", schedule.id, user.email);
                    sent += 1;
                    true
                }
                Err(e) => {
                    warn!(
                        "Scheduled email {} to {} failed: {}",
                        schedule.id, user.email, e
                    );
                    failed += 1;
                    last_error = Some(e.to_string());
                    false
                }
            };

            if let Some(metrics) = &self.metrics {
                metrics.record_email(delivered);
            }
        }

        let status = if sent > 0 {
            ScheduledEmailStatus::Sent
        } else {
            ScheduledEmailStatus::Failed
        };

        info!(
            "Scheduled email {}: {} sent, {} failed of {} recipients",
            schedule.id,
            sent,
            failed,
            recipients.len()
        );

        Ok(DispatchRecord {
            status,
            sent_count: sent as i32,
            failed_count: failed as i32,
            last_error,
        })
    }
}

/// Per-recipient variables. Recipient fields take precedence over
/// custom-subject pairs of the same name.
fn recipient_vars(
    subject_vars: &TemplateVars,
    template: &EmailTemplate,
    schedule: &ScheduledEmail,
    user: &User,
) -> TemplateVars {
    let mut vars = subject_vars.clone();
    vars.insert("name".to_string(), user.full_name());
    vars.insert("first_name".to_string(), user.first_name.clone());
    vars.insert(
        "last_name".to_string(),
        user.last_name.clone().unwrap_or_default(),
    );
    vars.insert("email".to_string(), user.email.clone());
    vars.insert("user_id".to_string(), user.id.to_string());
    vars.insert("template_name".to_string(), template.name.clone());
    vars.insert("scheduled_at".to_string(), schedule.scheduled_at.to_rfc3339());
    vars
}
