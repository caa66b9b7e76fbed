//! TrainHub Core - Scheduled delivery and background jobs
//!
//! This crate provides the scheduled-email dispatcher, the attack
//! simulation launcher, discount pricing for bundle purchases, and the
//! cron scheduler that drives the periodic sweeps.

pub mod delivery;
pub mod metrics;
pub mod pricing;
pub mod scheduler;
pub mod simulation;

#[cfg(test)]
mod testing;

pub use delivery::{
    CreateScheduleInput, DispatchOutcome, EmailSender, RecipientResolver, ScheduleManager,
    ScheduledEmailDispatcher, SmtpEmailSender, TemplateRenderer,
};
pub use metrics::DeliveryMetrics;
pub use pricing::{
    CreatePurchaseInput, DiscountPricingEngine, PricingError, PurchaseService, UpdatePurchaseInput,
};
pub use scheduler::{CleanupReport, CronScheduler, TokenCleanup};
pub use simulation::{
    AttackSimulationDispatcher, CampaignLauncher, CreateSimulationInput, HttpCampaignLauncher,
    LaunchOutcome, LaunchTarget, SimulationManager, UpdateSimulationInput,
};
