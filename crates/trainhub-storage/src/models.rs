//! Database models

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use trainhub_common::types::{
    BundleId, CompanyId, DiscountId, GroupId, PurchaseId, ScheduledEmailId, SimulationId,
    TemplateId, UserId, UserRole,
};

// ============================================================================
// Accounts
// ============================================================================

/// User model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub company_id: Option<CompanyId>,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Get role enum
    pub fn role_enum(&self) -> Option<UserRole> {
        self.role.parse().ok()
    }

    /// First and last name joined by a space
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref().map(str::trim) {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name.trim(), last),
            _ => self.first_name.trim().to_string(),
        }
    }
}

// ============================================================================
// Commerce
// ============================================================================

/// Bundle model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Bundle {
    pub id: BundleId,
    pub name: String,
    pub description: Option<String>,
    pub seat_price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Seat-threshold rule of a discount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatsRule {
    pub percentage: Decimal,
    pub seats_threshold: i32,
}

/// Discount model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Discount {
    pub id: DiscountId,
    /// `None` applies to whatever bundle is referenced at purchase time
    pub bundle_id: Option<BundleId>,
    /// Flat percentage, 0-100
    pub percentage: Option<Decimal>,
    pub seats_percentage: Option<Decimal>,
    pub seats_threshold: Option<i32>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discount {
    /// Seat-threshold rule, present only when both columns are set
    pub fn seats_rule(&self) -> Option<SeatsRule> {
        match (self.seats_percentage, self.seats_threshold) {
            (Some(percentage), Some(seats_threshold)) => Some(SeatsRule {
                percentage,
                seats_threshold,
            }),
            _ => None,
        }
    }

    /// Whether the discount has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= now)
    }
}

/// Create discount input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDiscount {
    pub bundle_id: Option<BundleId>,
    pub percentage: Option<Decimal>,
    pub seats_rule: Option<SeatsRule>,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Bundle purchase model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BundlePurchase {
    pub id: PurchaseId,
    pub bundle_id: BundleId,
    pub discount_id: Option<DiscountId>,
    pub seats_purchased: i32,
    pub total_price: Decimal,
    pub purchased_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create bundle purchase input, priced by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBundlePurchase {
    pub bundle_id: BundleId,
    pub discount_id: Option<DiscountId>,
    pub seats_purchased: i32,
    pub total_price: Decimal,
    pub purchased_by: UserId,
}

/// Update bundle purchase input, repriced by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBundlePurchase {
    pub discount_id: Option<DiscountId>,
    pub seats_purchased: i32,
    pub total_price: Decimal,
}

/// New price of a purchase whose discount is being removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepricedPurchase {
    pub purchase_id: PurchaseId,
    pub total_price: Decimal,
}

// ============================================================================
// Scheduled email
// ============================================================================

/// Email template model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: TemplateId,
    pub name: String,
    /// Category tag
    pub template_type: String,
    pub subject: String,
    pub body: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create email template input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEmailTemplate {
    pub name: String,
    pub template_type: String,
    pub subject: String,
    pub body: String,
}

/// Scheduled email status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledEmailStatus {
    Draft,
    Scheduled,
    Sent,
    Failed,
    Cancelled,
}

impl ScheduledEmailStatus {
    /// Statuses picked up by the dispatch sweep
    pub const DISPATCHABLE: [ScheduledEmailStatus; 3] = [
        ScheduledEmailStatus::Draft,
        ScheduledEmailStatus::Scheduled,
        ScheduledEmailStatus::Failed,
    ];

    /// Statuses from which a manual cancel is accepted
    pub const CANCELLABLE: [ScheduledEmailStatus; 3] = [
        ScheduledEmailStatus::Draft,
        ScheduledEmailStatus::Scheduled,
        ScheduledEmailStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledEmailStatus::Draft => "draft",
            ScheduledEmailStatus::Scheduled => "scheduled",
            ScheduledEmailStatus::Sent => "sent",
            ScheduledEmailStatus::Failed => "failed",
            ScheduledEmailStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ScheduledEmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScheduledEmailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ScheduledEmailStatus::Draft),
            "scheduled" => Ok(ScheduledEmailStatus::Scheduled),
            "sent" => Ok(ScheduledEmailStatus::Sent),
            "failed" => Ok(ScheduledEmailStatus::Failed),
            "cancelled" => Ok(ScheduledEmailStatus::Cancelled),
            _ => Err(format!("Invalid scheduled email status: {}", s)),
        }
    }
}

/// Scheduled email model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScheduledEmail {
    pub id: ScheduledEmailId,
    pub template_id: TemplateId,
    pub custom_subject: Option<String>,
    pub status: String,
    pub created_by: UserId,
    pub scheduled_at: DateTime<Utc>,
    /// Recipients reached by the most recent dispatch
    pub sent_count: i32,
    /// Recipients that failed in the most recent dispatch
    pub failed_count: i32,
    pub last_error: Option<String>,
    pub last_dispatched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledEmail {
    /// Get status enum
    pub fn status_enum(&self) -> Option<ScheduledEmailStatus> {
        self.status.parse().ok()
    }
}

/// Create scheduled email input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduledEmail {
    pub template_id: TemplateId,
    pub custom_subject: Option<String>,
    pub status: ScheduledEmailStatus,
    pub created_by: UserId,
    pub scheduled_at: DateTime<Utc>,
}

/// Outcome of one dispatch, persisted on the schedule row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub status: ScheduledEmailStatus,
    pub sent_count: i32,
    pub failed_count: i32,
    pub last_error: Option<String>,
}

// ============================================================================
// Attack simulations
// ============================================================================

/// Lifecycle status of a scheduled simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    Draft,
    Scheduled,
    Completed,
    Cancelled,
}

impl SimulationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationStatus::Draft => "draft",
            SimulationStatus::Scheduled => "scheduled",
            SimulationStatus::Completed => "completed",
            SimulationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SimulationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SimulationStatus::Draft),
            "scheduled" => Ok(SimulationStatus::Scheduled),
            "completed" => Ok(SimulationStatus::Completed),
            "cancelled" => Ok(SimulationStatus::Cancelled),
            _ => Err(format!("Invalid simulation status: {}", s)),
        }
    }
}

/// Launch intent before dispatch, execution outcome after
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaunchStatus {
    #[serde(rename = "Deliver Immediately")]
    DeliverImmediately,
    #[serde(rename = "Schedule Later")]
    ScheduleLater,
    #[serde(rename = "Launched")]
    Launched,
    #[serde(rename = "Launch Failed")]
    LaunchFailed,
}

impl LaunchStatus {
    /// Launch intents still waiting for the sweep
    pub const PENDING: [LaunchStatus; 2] =
        [LaunchStatus::DeliverImmediately, LaunchStatus::ScheduleLater];

    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchStatus::DeliverImmediately => "Deliver Immediately",
            LaunchStatus::ScheduleLater => "Schedule Later",
            LaunchStatus::Launched => "Launched",
            LaunchStatus::LaunchFailed => "Launch Failed",
        }
    }

    /// Whether execution has not started yet
    pub fn is_pending(&self) -> bool {
        Self::PENDING.contains(self)
    }
}

impl std::fmt::Display for LaunchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LaunchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deliver Immediately" => Ok(LaunchStatus::DeliverImmediately),
            "Schedule Later" => Ok(LaunchStatus::ScheduleLater),
            "Launched" => Ok(LaunchStatus::Launched),
            "Launch Failed" => Ok(LaunchStatus::LaunchFailed),
            _ => Err(format!("Invalid launch status: {}", s)),
        }
    }
}

/// Scheduled attack simulation model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScheduledSimulation {
    pub id: SimulationId,
    pub name: String,
    pub group_ids: Vec<GroupId>,
    pub bundle_id: BundleId,
    pub campaign_type: String,
    pub launch_date: NaiveDate,
    pub launch_time: NaiveTime,
    /// IANA timezone name the date and time are expressed in
    pub timezone: String,
    /// Normalized launch instant
    pub launch_at: DateTime<Utc>,
    pub status: String,
    pub launch_status: String,
    pub created_by: UserId,
    pub launched_count: i32,
    pub failed_count: i32,
    pub last_error: Option<String>,
    pub launched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledSimulation {
    /// Get status enum
    pub fn status_enum(&self) -> Option<SimulationStatus> {
        self.status.parse().ok()
    }

    /// Get launch status enum
    pub fn launch_status_enum(&self) -> Option<LaunchStatus> {
        self.launch_status.parse().ok()
    }

    /// Whether groups and bundle can still be changed
    pub fn targets_mutable(&self) -> bool {
        self.launch_status_enum().is_some_and(|s| s.is_pending())
    }
}

/// Create simulation input, with the launch instant already normalized
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSimulation {
    pub name: String,
    pub group_ids: Vec<GroupId>,
    pub bundle_id: BundleId,
    pub campaign_type: String,
    pub launch_date: NaiveDate,
    pub launch_time: NaiveTime,
    pub timezone: String,
    pub launch_at: DateTime<Utc>,
    pub status: SimulationStatus,
    pub launch_status: LaunchStatus,
    pub created_by: UserId,
}

/// Full replacement of a simulation's editable fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSimulation {
    pub name: String,
    pub group_ids: Vec<GroupId>,
    pub bundle_id: BundleId,
    pub campaign_type: String,
    pub launch_date: NaiveDate,
    pub launch_time: NaiveTime,
    pub timezone: String,
    pub launch_at: DateTime<Utc>,
    pub launch_status: LaunchStatus,
}

/// Outcome of one launch attempt, persisted on the simulation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRecord {
    pub launch_status: LaunchStatus,
    /// New lifecycle status, `None` leaves it unchanged
    pub status: Option<SimulationStatus>,
    pub launched_count: i32,
    pub failed_count: i32,
    pub last_error: Option<String>,
}
