//! Common types for TrainHub

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for users
pub type UserId = Uuid;

/// Unique identifier for companies
pub type CompanyId = Uuid;

/// Unique identifier for groups
pub type GroupId = Uuid;

/// Unique identifier for bundles
pub type BundleId = Uuid;

/// Unique identifier for discounts
pub type DiscountId = Uuid;

/// Unique identifier for bundle purchases
pub type PurchaseId = Uuid;

/// Unique identifier for email templates
pub type TemplateId = Uuid;

/// Unique identifier for scheduled emails
pub type ScheduledEmailId = Uuid;

/// Unique identifier for scheduled attack simulations
pub type SimulationId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    CompanyAdmin,
    Learner,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::SuperAdmin => write!(f, "super_admin"),
            UserRole::CompanyAdmin => write!(f, "company_admin"),
            UserRole::Learner => write!(f, "learner"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(UserRole::SuperAdmin),
            "company_admin" => Ok(UserRole::CompanyAdmin),
            "learner" => Ok(UserRole::Learner),
            other => Err(crate::Error::Validation(format!("Invalid user role: {}", other))),
        }
    }
}

/// Outcome counts of one sweep, as reported to operators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Records picked up by the sweep
    pub processed: usize,
    /// Records that ended in a success state
    pub success: usize,
    /// Records that ended in a failure state
    pub failed: usize,
}

impl SweepSummary {
    /// Record one processed item
    pub fn record(&mut self, succeeded: bool) {
        self.processed += 1;
        if succeeded {
            self.success += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Record an item that was picked up but left untouched, e.g. because
    /// it was cancelled while in flight
    pub fn record_skipped(&mut self) {
        self.processed += 1;
    }
}
