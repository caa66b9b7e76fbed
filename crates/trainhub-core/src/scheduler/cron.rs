//! Cron Scheduler - Fixed-interval timer for the delivery jobs
//!
//! Each job owns a guard. A timer tick that finds the guard taken is
//! skipped; a manual trigger waits for it and then runs the same sweep.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use trainhub_common::config::SchedulerConfig;
use trainhub_common::types::SweepSummary;
use trainhub_common::Result;

use super::cleanup::TokenCleanup;
use crate::delivery::ScheduledEmailDispatcher;
use crate::metrics::DeliveryMetrics;
use crate::simulation::AttackSimulationDispatcher;

/// Process-wide scheduler for the delivery sweeps
pub struct CronScheduler {
    emails: Arc<ScheduledEmailDispatcher>,
    simulations: Arc<AttackSimulationDispatcher>,
    cleanup: Arc<TokenCleanup>,
    metrics: Option<DeliveryMetrics>,
    email_interval: Duration,
    simulation_interval: Duration,
    cleanup_interval: Duration,
    email_guard: Arc<Mutex<()>>,
    simulation_guard: Arc<Mutex<()>>,
    cleanup_guard: Arc<Mutex<()>>,
}

impl CronScheduler {
    pub fn new(
        emails: Arc<ScheduledEmailDispatcher>,
        simulations: Arc<AttackSimulationDispatcher>,
        cleanup: Arc<TokenCleanup>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            emails,
            simulations,
            cleanup,
            metrics: None,
            email_interval: Duration::from_secs(config.email_interval_secs.max(1)),
            simulation_interval: Duration::from_secs(config.simulation_interval_secs.max(1)),
            cleanup_interval: Duration::from_secs(config.cleanup_interval_secs.max(1)),
            email_guard: Arc::new(Mutex::new(())),
            simulation_guard: Arc::new(Mutex::new(())),
            cleanup_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_metrics(mut self, metrics: DeliveryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawn the three timer loops. They run until aborted.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(
            "Cron scheduler started (emails: {}s, simulations: {}s, cleanup: {}s)",
            self.email_interval.as_secs(),
            self.simulation_interval.as_secs(),
            self.cleanup_interval.as_secs()
        );

        let emails = Arc::clone(&self.emails);
        let simulations = Arc::clone(&self.simulations);
        let cleanup = Arc::clone(&self.cleanup);
        let metrics = self.metrics.clone();

        vec![
            spawn_job(
                "scheduled_emails",
                self.email_interval,
                Arc::clone(&self.email_guard),
                move || {
                    let emails = Arc::clone(&emails);
                    async move { emails.run().await }
                },
            ),
            spawn_job(
                "simulation_launches",
                self.simulation_interval,
                Arc::clone(&self.simulation_guard),
                move || {
                    let simulations = Arc::clone(&simulations);
                    async move { simulations.run().await }
                },
            ),
            spawn_job(
                "cleanup",
                self.cleanup_interval,
                Arc::clone(&self.cleanup_guard),
                move || {
                    let cleanup = Arc::clone(&cleanup);
                    let metrics = metrics.clone();
                    async move { Ok(timed_cleanup(&cleanup, metrics.as_ref()).await) }
                },
            ),
        ]
    }

    /// Run the scheduled-email sweep now, after any in-flight run finishes
    pub async fn run_scheduled_emails_now(&self) -> Result<SweepSummary> {
        let _running = self.email_guard.lock().await;
        info!("Manual scheduled email sweep triggered");
        self.emails.run().await
    }

    /// Run the simulation-launch sweep now, after any in-flight run finishes
    pub async fn run_simulation_launches_now(&self) -> Result<SweepSummary> {
        let _running = self.simulation_guard.lock().await;
        info!("Manual simulation launch sweep triggered");
        self.simulations.run().await
    }

    /// Run the cleanup job now, after any in-flight run finishes
    pub async fn run_cleanup_now(&self) -> Result<SweepSummary> {
        let _running = self.cleanup_guard.lock().await;
        info!("Manual cleanup triggered");
        Ok(timed_cleanup(&self.cleanup, self.metrics.as_ref()).await)
    }
}

async fn timed_cleanup(cleanup: &TokenCleanup, metrics: Option<&DeliveryMetrics>) -> SweepSummary {
    let started = std::time::Instant::now();
    let report = cleanup.run().await;
    if let Some(metrics) = metrics {
        metrics.observe_sweep("cleanup", started.elapsed().as_secs_f64());
    }
    report.summary()
}

fn spawn_job<F, Fut>(
    name: &'static str,
    period: Duration,
    guard: Arc<Mutex<()>>,
    job: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<SweepSummary>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; jobs first run one period after boot
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Ok(_running) = guard.try_lock() else {
                warn!("Job {} is still running, skipping tick", name);
                continue;
            };

            match job().await {
                Ok(summary) => debug!(
                    "Job {} finished: {} processed, {} succeeded, {} failed",
                    name, summary.processed, summary.success, summary.failed
                ),
                Err(e) => error!("Job {} failed: {}", name, e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::RecipientResolver;
    use crate::testing::{user, InMemoryStore, RecordingLauncher, RecordingSender};
    use trainhub_storage::models::ScheduledEmailStatus;

    fn scheduler(store: &Arc<InMemoryStore>, sender: Arc<RecordingSender>) -> Arc<CronScheduler> {
        let resolver = Arc::new(RecipientResolver::new(store.clone(), store.clone()));
        let emails = Arc::new(ScheduledEmailDispatcher::new(
            store.clone(),
            store.clone(),
            resolver.clone(),
            sender,
        ));
        let simulations = Arc::new(AttackSimulationDispatcher::new(
            store.clone(),
            store.clone(),
            resolver,
            RecordingLauncher::new(),
        ));
        let cleanup = Arc::new(TokenCleanup::new(store.clone()));

        Arc::new(CronScheduler::new(
            emails,
            simulations,
            cleanup,
            &SchedulerConfig::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_email_job_runs_on_interval() {
        let store = InMemoryStore::new();
        let ana = store.add_user(user("ana@example.com", true));
        let schedule = store.add_schedule_for(&[ana.id]);
        let sender = RecordingSender::new();
        let handles = scheduler(&store, sender.clone()).start();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(sender.recipients().is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(sender.recipients().len(), 1);
        assert_eq!(
            store.schedule(schedule.id).status_enum(),
            Some(ScheduledEmailStatus::Sent)
        );

        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_skipped_while_guard_held() {
        let store = InMemoryStore::new();
        let ana = store.add_user(user("ana@example.com", true));
        let schedule = store.add_schedule_for(&[ana.id]);
        let sender = RecordingSender::new();
        let scheduler = scheduler(&store, sender.clone());
        let handles = scheduler.start();

        let held = scheduler.email_guard.clone().lock_owned().await;
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(sender.recipients().is_empty());
        drop(held);

        let summary = scheduler.run_scheduled_emails_now().await.unwrap();
        assert_eq!(summary.success, 1);
        assert_eq!(
            store.schedule(schedule.id).status_enum(),
            Some(ScheduledEmailStatus::Sent)
        );

        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn test_manual_triggers_report_summaries() {
        let store = InMemoryStore::new();
        store.add_session(chrono::Utc::now() - chrono::Duration::hours(1));
        let scheduler = scheduler(&store, RecordingSender::new());

        assert_eq!(
            scheduler.run_simulation_launches_now().await.unwrap(),
            SweepSummary::default()
        );
        let cleanup = scheduler.run_cleanup_now().await.unwrap();
        assert_eq!(cleanup.success, 1);
    }
}
