//! TrainHub - Delivery worker entry point

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use trainhub_api::AppState;
use trainhub_common::config::{Config, LoggingConfig};
use trainhub_core::{
    AttackSimulationDispatcher, CronScheduler, DeliveryMetrics, HttpCampaignLauncher,
    RecipientResolver, ScheduledEmailDispatcher, SmtpEmailSender, TokenCleanup,
};
use trainhub_storage::db::DatabasePool;
use trainhub_storage::repository::{
    DbBundleRepository, DbEmailTemplateRepository, DbScheduledEmailRepository,
    DbSessionRepository, DbSimulationRepository, DbUserRepository,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting TrainHub delivery worker...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;

    // Run migrations
    db_pool.migrate().await?;

    // Repositories
    let schedules = Arc::new(DbScheduledEmailRepository::new(db_pool.clone()));
    let templates = Arc::new(DbEmailTemplateRepository::new(db_pool.clone()));
    let users = Arc::new(DbUserRepository::new(db_pool.clone()));
    let simulations = Arc::new(DbSimulationRepository::new(db_pool.clone()));
    let bundles = Arc::new(DbBundleRepository::new(db_pool.clone()));
    let sessions = Arc::new(DbSessionRepository::new(db_pool.clone()));

    // Outbound transports
    let sender = Arc::new(SmtpEmailSender::new(&config.smtp, &config.server.hostname)?);
    let launcher = Arc::new(HttpCampaignLauncher::new(&config.simulation)?);
    info!(
        "Outbound SMTP relay {}:{}, campaign platform {}",
        config.smtp.host, config.smtp.port, config.simulation.launcher_url
    );

    let metrics = DeliveryMetrics::new()?;
    let resolver = Arc::new(RecipientResolver::new(schedules.clone(), users));

    let email_dispatcher = Arc::new(
        ScheduledEmailDispatcher::new(schedules, templates, resolver.clone(), sender)
            .with_concurrency_limit(config.scheduler.concurrency_limit)
            .with_batch_size(config.scheduler.batch_size)
            .with_metrics(metrics.clone()),
    );
    let simulation_dispatcher = Arc::new(
        AttackSimulationDispatcher::new(simulations, bundles, resolver, launcher)
            .with_concurrency_limit(config.scheduler.concurrency_limit)
            .with_batch_size(config.scheduler.batch_size)
            .with_metrics(metrics.clone()),
    );
    let cleanup = Arc::new(TokenCleanup::new(sessions));

    let scheduler = Arc::new(
        CronScheduler::new(
            email_dispatcher,
            simulation_dispatcher,
            cleanup,
            &config.scheduler,
        )
        .with_metrics(metrics.clone()),
    );

    // Start the timer if enabled
    let job_handles = if config.scheduler.enabled {
        scheduler.start()
    } else {
        info!("Cron scheduler disabled, jobs run only on manual trigger");
        Vec::new()
    };

    // Start admin server if enabled
    let admin_handle = if config.admin.enabled {
        let app = trainhub_api::create_router(AppState {
            jobs: scheduler.clone(),
            database: Arc::new(db_pool.clone()),
            metrics,
        });
        let listener = tokio::net::TcpListener::bind(&config.admin.bind).await?;
        info!("Starting admin endpoint on {}", config.admin.bind);

        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Admin server error: {}", e);
            }
        }))
    } else {
        info!("Admin endpoint disabled");
        None
    };

    info!("TrainHub delivery worker started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    for handle in job_handles {
        handle.abort();
    }
    if let Some(handle) = admin_handle {
        handle.abort();
    }

    info!("TrainHub delivery worker shutdown complete");

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},trainhub=debug", config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
