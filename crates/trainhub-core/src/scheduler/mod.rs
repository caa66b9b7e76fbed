//! Scheduler Module - Timer-driven jobs and manual triggers

mod cleanup;
mod cron;

pub use cleanup::{CleanupReport, TokenCleanup};
pub use cron::CronScheduler;
