//! In-memory repositories and transport fakes for unit tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use trainhub_common::types::{
    BundleId, DiscountId, GroupId, PurchaseId, ScheduledEmailId, SimulationId, TemplateId, UserId,
};
use trainhub_common::{Error, Result};
use trainhub_storage::models::*;
use trainhub_storage::repository::*;
use uuid::Uuid;

use crate::delivery::EmailSender;
use crate::simulation::{CampaignLauncher, LaunchTarget};

pub fn user(email: &str, is_active: bool) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        company_id: None,
        email: email.to_string(),
        first_name: email.split('@').next().unwrap_or_default().to_string(),
        last_name: None,
        role: "learner".to_string(),
        is_active,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    groups: HashMap<GroupId, Vec<UserId>>,
    templates: HashMap<TemplateId, EmailTemplate>,
    schedules: HashMap<ScheduledEmailId, ScheduledEmail>,
    recipients: HashMap<ScheduledEmailId, Vec<UserId>>,
    simulations: HashMap<SimulationId, ScheduledSimulation>,
    bundles: HashMap<BundleId, Bundle>,
    discounts: HashMap<DiscountId, Discount>,
    purchases: Vec<BundlePurchase>,
    sessions: Vec<DateTime<Utc>>,
    reset_tokens: Vec<DateTime<Utc>>,
}

/// Single in-memory store implementing every repository trait
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn add_user(&self, user: User) -> User {
        self.with(|s| s.users.push(user.clone()));
        user
    }

    pub fn add_group(&self, members: &[UserId]) -> GroupId {
        let id = Uuid::new_v4();
        self.with(|s| s.groups.insert(id, members.to_vec()));
        id
    }

    pub fn add_template(&self, name: &str, subject: &str, body: &str, is_active: bool) -> EmailTemplate {
        let now = Utc::now();
        let template = EmailTemplate {
            id: Uuid::new_v4(),
            name: name.to_string(),
            template_type: "notification".to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            is_active,
            created_at: now,
            updated_at: now,
        };
        self.with(|s| s.templates.insert(template.id, template.clone()));
        template
    }

    pub fn add_schedule(
        &self,
        template_id: TemplateId,
        custom_subject: Option<&str>,
        status: ScheduledEmailStatus,
        scheduled_at: DateTime<Utc>,
        recipients: &[UserId],
    ) -> ScheduledEmail {
        let now = Utc::now();
        let schedule = ScheduledEmail {
            id: Uuid::new_v4(),
            template_id,
            custom_subject: custom_subject.map(str::to_string),
            status: status.to_string(),
            created_by: Uuid::new_v4(),
            scheduled_at,
            sent_count: 0,
            failed_count: 0,
            last_error: None,
            last_dispatched_at: None,
            created_at: now,
            updated_at: now,
        };
        self.with(|s| {
            s.schedules.insert(schedule.id, schedule.clone());
            s.recipients.insert(schedule.id, recipients.to_vec());
        });
        schedule
    }

    /// Due schedule on a fresh active template
    pub fn add_schedule_for(&self, recipients: &[UserId]) -> ScheduledEmail {
        let template = self.add_template(
            &format!("template-{}", Uuid::new_v4()),
            "Reminder for [first_name]",
            "Hello [name]",
            true,
        );
        self.add_schedule(
            template.id,
            None,
            ScheduledEmailStatus::Scheduled,
            Utc::now() - chrono::Duration::minutes(1),
            recipients,
        )
    }

    pub fn schedule(&self, id: ScheduledEmailId) -> ScheduledEmail {
        self.with(|s| s.schedules[&id].clone())
    }

    pub fn set_schedule_status(&self, id: ScheduledEmailId, status: ScheduledEmailStatus) {
        self.with(|s| {
            if let Some(schedule) = s.schedules.get_mut(&id) {
                schedule.status = status.to_string();
            }
        });
    }

    pub fn recipient_ids(&self, id: ScheduledEmailId) -> Vec<UserId> {
        self.with(|s| s.recipients.get(&id).cloned().unwrap_or_default())
    }

    pub fn add_bundle(&self, seat_price: &str) -> Bundle {
        let now = Utc::now();
        let bundle = Bundle {
            id: Uuid::new_v4(),
            name: "Bundle".to_string(),
            description: None,
            seat_price: seat_price.parse().unwrap(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.with(|s| s.bundles.insert(bundle.id, bundle.clone()));
        bundle
    }

    pub fn discount(&self, id: DiscountId) -> Discount {
        self.with(|s| s.discounts[&id].clone())
    }

    pub fn purchase(&self, id: PurchaseId) -> BundlePurchase {
        self.with(|s| s.purchases.iter().find(|p| p.id == id).cloned().unwrap())
    }

    pub fn purchase_count(&self) -> usize {
        self.with(|s| s.purchases.len())
    }

    pub fn add_simulation(
        &self,
        group_ids: &[GroupId],
        bundle_id: BundleId,
        launch_at: DateTime<Utc>,
    ) -> ScheduledSimulation {
        let now = Utc::now();
        let simulation = ScheduledSimulation {
            id: Uuid::new_v4(),
            name: "Drill".to_string(),
            group_ids: group_ids.to_vec(),
            bundle_id,
            campaign_type: "credential_harvest".to_string(),
            launch_date: launch_at.date_naive(),
            launch_time: launch_at.time(),
            timezone: "UTC".to_string(),
            launch_at,
            status: SimulationStatus::Scheduled.to_string(),
            launch_status: LaunchStatus::ScheduleLater.to_string(),
            created_by: Uuid::new_v4(),
            launched_count: 0,
            failed_count: 0,
            last_error: None,
            launched_at: None,
            created_at: now,
            updated_at: now,
        };
        self.with(|s| s.simulations.insert(simulation.id, simulation.clone()));
        simulation
    }

    pub fn simulation(&self, id: SimulationId) -> ScheduledSimulation {
        self.with(|s| s.simulations[&id].clone())
    }

    pub fn set_simulation_status(&self, id: SimulationId, status: SimulationStatus) {
        self.with(|s| {
            if let Some(sim) = s.simulations.get_mut(&id) {
                sim.status = status.to_string();
            }
        });
    }

    pub fn set_launch_status(&self, id: SimulationId, launch_status: LaunchStatus) {
        self.with(|s| {
            if let Some(sim) = s.simulations.get_mut(&id) {
                sim.launch_status = launch_status.to_string();
            }
        });
    }

    pub fn add_session(&self, expires_at: DateTime<Utc>) {
        self.with(|s| s.sessions.push(expires_at));
    }

    pub fn add_reset_token(&self, expires_at: DateTime<Utc>) {
        self.with(|s| s.reset_tokens.push(expires_at));
    }

    pub fn session_count(&self) -> usize {
        self.with(|s| s.sessions.len())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.with(|s| s.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn list_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>> {
        Ok(self.with(|s| {
            s.users
                .iter()
                .filter(|u| ids.contains(&u.id))
                .cloned()
                .collect()
        }))
    }

    async fn list_group_members(&self, group_ids: &[GroupId]) -> Result<Vec<User>> {
        Ok(self.with(|s| {
            let members: HashSet<UserId> = group_ids
                .iter()
                .filter_map(|g| s.groups.get(g))
                .flatten()
                .copied()
                .collect();
            s.users
                .iter()
                .filter(|u| members.contains(&u.id))
                .cloned()
                .collect()
        }))
    }
}

#[async_trait]
impl EmailTemplateRepository for InMemoryStore {
    async fn create(&self, input: CreateEmailTemplate) -> Result<EmailTemplate> {
        Ok(self.add_template(&input.name, &input.subject, &input.body, true))
    }

    async fn get(&self, id: TemplateId) -> Result<Option<EmailTemplate>> {
        Ok(self.with(|s| s.templates.get(&id).cloned()))
    }

    async fn set_active(&self, id: TemplateId, is_active: bool) -> Result<()> {
        self.with(|s| match s.templates.get_mut(&id) {
            Some(t) => {
                t.is_active = is_active;
                Ok(())
            }
            None => Err(Error::NotFound(format!("Email template {}", id))),
        })
    }
}

#[async_trait]
impl ScheduledEmailRepository for InMemoryStore {
    async fn create_with_recipients(
        &self,
        input: CreateScheduledEmail,
        recipients: &[UserId],
    ) -> Result<ScheduledEmail> {
        Ok(self.add_schedule(
            input.template_id,
            input.custom_subject.as_deref(),
            input.status,
            input.scheduled_at,
            recipients,
        ))
    }

    async fn get(&self, id: ScheduledEmailId) -> Result<Option<ScheduledEmail>> {
        Ok(self.with(|s| s.schedules.get(&id).cloned()))
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledEmail>> {
        Ok(self.with(|s| {
            let mut due: Vec<ScheduledEmail> = s
                .schedules
                .values()
                .filter(|e| e.scheduled_at <= now)
                .filter(|e| {
                    e.status_enum()
                        .is_some_and(|st| ScheduledEmailStatus::DISPATCHABLE.contains(&st))
                })
                .cloned()
                .collect();
            due.sort_by_key(|e| {
                (
                    e.status_enum() == Some(ScheduledEmailStatus::Failed),
                    e.last_dispatched_at.unwrap_or(e.scheduled_at),
                    e.scheduled_at,
                )
            });
            due.truncate(limit as usize);
            due
        }))
    }

    async fn list_recipients(&self, id: ScheduledEmailId) -> Result<Vec<User>> {
        Ok(self.with(|s| {
            s.recipients
                .get(&id)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|uid| s.users.iter().find(|u| u.id == *uid).cloned())
                        .collect()
                })
                .unwrap_or_default()
        }))
    }

    async fn replace_recipients(&self, id: ScheduledEmailId, recipients: &[UserId]) -> Result<()> {
        self.with(|s| s.recipients.insert(id, recipients.to_vec()));
        Ok(())
    }

    async fn update_status(
        &self,
        id: ScheduledEmailId,
        from: &[ScheduledEmailStatus],
        to: ScheduledEmailStatus,
    ) -> Result<bool> {
        Ok(self.with(|s| match s.schedules.get_mut(&id) {
            Some(e) if e.status_enum().is_some_and(|st| from.contains(&st)) => {
                e.status = to.to_string();
                true
            }
            _ => false,
        }))
    }

    async fn record_dispatch(
        &self,
        id: ScheduledEmailId,
        record: DispatchRecord,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with(|s| {
            let e = s
                .schedules
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound(format!("Scheduled email {}", id)))?;
            if !e
                .status_enum()
                .is_some_and(|st| ScheduledEmailStatus::DISPATCHABLE.contains(&st))
            {
                return Ok(false);
            }
            e.status = record.status.to_string();
            e.sent_count = record.sent_count;
            e.failed_count = record.failed_count;
            e.last_error = record.last_error;
            e.last_dispatched_at = Some(now);
            Ok(true)
        })
    }
}

#[async_trait]
impl SimulationRepository for InMemoryStore {
    async fn create(&self, input: CreateSimulation) -> Result<ScheduledSimulation> {
        let now = Utc::now();
        let simulation = ScheduledSimulation {
            id: Uuid::new_v4(),
            name: input.name,
            group_ids: input.group_ids,
            bundle_id: input.bundle_id,
            campaign_type: input.campaign_type,
            launch_date: input.launch_date,
            launch_time: input.launch_time,
            timezone: input.timezone,
            launch_at: input.launch_at,
            status: input.status.to_string(),
            launch_status: input.launch_status.to_string(),
            created_by: input.created_by,
            launched_count: 0,
            failed_count: 0,
            last_error: None,
            launched_at: None,
            created_at: now,
            updated_at: now,
        };
        self.with(|s| s.simulations.insert(simulation.id, simulation.clone()));
        Ok(simulation)
    }

    async fn get(&self, id: SimulationId) -> Result<Option<ScheduledSimulation>> {
        Ok(self.with(|s| s.simulations.get(&id).cloned()))
    }

    async fn update(
        &self,
        id: SimulationId,
        expected: LaunchStatus,
        input: UpdateSimulation,
    ) -> Result<Option<ScheduledSimulation>> {
        Ok(self.with(|s| match s.simulations.get_mut(&id) {
            Some(sim) if sim.launch_status_enum() == Some(expected) => {
                sim.name = input.name;
                sim.group_ids = input.group_ids;
                sim.bundle_id = input.bundle_id;
                sim.campaign_type = input.campaign_type;
                sim.launch_date = input.launch_date;
                sim.launch_time = input.launch_time;
                sim.timezone = input.timezone;
                sim.launch_at = input.launch_at;
                sim.launch_status = input.launch_status.to_string();
                Some(sim.clone())
            }
            _ => None,
        }))
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledSimulation>> {
        Ok(self.with(|s| {
            let mut due: Vec<ScheduledSimulation> = s
                .simulations
                .values()
                .filter(|sim| sim.launch_at <= now && sim.targets_mutable())
                .filter(|sim| {
                    matches!(
                        sim.status_enum(),
                        Some(SimulationStatus::Draft | SimulationStatus::Scheduled)
                    )
                })
                .cloned()
                .collect();
            due.sort_by_key(|sim| sim.launch_at);
            due.truncate(limit as usize);
            due
        }))
    }

    async fn update_status(
        &self,
        id: SimulationId,
        from: &[SimulationStatus],
        to: SimulationStatus,
    ) -> Result<bool> {
        Ok(self.with(|s| match s.simulations.get_mut(&id) {
            Some(sim) if sim.status_enum().is_some_and(|st| from.contains(&st)) => {
                sim.status = to.to_string();
                true
            }
            _ => false,
        }))
    }

    async fn record_launch(
        &self,
        id: SimulationId,
        record: LaunchRecord,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self.with(|s| match s.simulations.get_mut(&id) {
            Some(sim)
                if sim.targets_mutable()
                    && sim.status_enum() != Some(SimulationStatus::Cancelled) =>
            {
                sim.launch_status = record.launch_status.to_string();
                if let Some(status) = record.status {
                    sim.status = status.to_string();
                }
                sim.launched_count = record.launched_count;
                sim.failed_count = record.failed_count;
                sim.last_error = record.last_error;
                sim.launched_at = Some(now);
                true
            }
            _ => false,
        }))
    }
}

#[async_trait]
impl BundleRepository for InMemoryStore {
    async fn get(&self, id: BundleId) -> Result<Option<Bundle>> {
        Ok(self.with(|s| s.bundles.get(&id).cloned()))
    }
}

#[async_trait]
impl DiscountRepository for InMemoryStore {
    async fn create(&self, input: CreateDiscount) -> Result<Discount> {
        let now = Utc::now();
        let discount = Discount {
            id: Uuid::new_v4(),
            bundle_id: input.bundle_id,
            percentage: input.percentage,
            seats_percentage: input.seats_rule.map(|r| r.percentage),
            seats_threshold: input.seats_rule.map(|r| r.seats_threshold),
            expiry_date: input.expiry_date,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.with(|s| s.discounts.insert(discount.id, discount.clone()));
        Ok(discount)
    }

    async fn get(&self, id: DiscountId) -> Result<Option<Discount>> {
        Ok(self.with(|s| s.discounts.get(&id).cloned()))
    }

    async fn delete(&self, id: DiscountId) -> Result<bool> {
        Ok(self.with(|s| {
            if s.discounts.remove(&id).is_none() {
                return false;
            }
            for purchase in s.purchases.iter_mut() {
                if purchase.discount_id == Some(id) {
                    purchase.discount_id = None;
                }
            }
            true
        }))
    }

    async fn deactivate_with_repricing(
        &self,
        id: DiscountId,
        repriced: &[RepricedPurchase],
    ) -> Result<()> {
        self.with(|s| {
            if !s.discounts.get(&id).is_some_and(|d| d.is_active) {
                return Err(Error::StateConflict(format!(
                    "Discount {} is no longer active",
                    id
                )));
            }

            let listed: HashSet<PurchaseId> = repriced.iter().map(|r| r.purchase_id).collect();
            let referencing: HashSet<PurchaseId> = s
                .purchases
                .iter()
                .filter(|p| p.discount_id == Some(id))
                .map(|p| p.id)
                .collect();
            if listed != referencing {
                return Err(Error::StateConflict(format!(
                    "Purchases referencing discount {} changed",
                    id
                )));
            }

            let prices: HashMap<PurchaseId, Decimal> = repriced
                .iter()
                .map(|r| (r.purchase_id, r.total_price))
                .collect();
            for purchase in s.purchases.iter_mut() {
                if let Some(price) = prices.get(&purchase.id) {
                    purchase.total_price = *price;
                    purchase.discount_id = None;
                }
            }
            if let Some(discount) = s.discounts.get_mut(&id) {
                discount.is_active = false;
            }
            Ok(())
        })
    }
}

fn check_discount_active(s: &State, discount_id: Option<DiscountId>) -> Result<()> {
    let Some(id) = discount_id else {
        return Ok(());
    };
    match s.discounts.get(&id) {
        Some(d) if d.is_active => Ok(()),
        Some(_) => Err(Error::StateConflict(format!("Discount {} is no longer active", id))),
        None => Err(Error::NotFound(format!("Discount {}", id))),
    }
}

#[async_trait]
impl PurchaseRepository for InMemoryStore {
    async fn create(&self, input: CreateBundlePurchase) -> Result<BundlePurchase> {
        let now = Utc::now();
        let purchase = BundlePurchase {
            id: Uuid::new_v4(),
            bundle_id: input.bundle_id,
            discount_id: input.discount_id,
            seats_purchased: input.seats_purchased,
            total_price: input.total_price,
            purchased_by: input.purchased_by,
            created_at: now,
            updated_at: now,
        };
        self.with(|s| {
            check_discount_active(s, input.discount_id)?;
            s.purchases.push(purchase.clone());
            Ok(purchase)
        })
    }

    async fn get(&self, id: PurchaseId) -> Result<Option<BundlePurchase>> {
        Ok(self.with(|s| s.purchases.iter().find(|p| p.id == id).cloned()))
    }

    async fn update_pricing(
        &self,
        id: PurchaseId,
        input: UpdateBundlePurchase,
    ) -> Result<Option<BundlePurchase>> {
        self.with(|s| {
            check_discount_active(s, input.discount_id)?;
            Ok(s.purchases.iter_mut().find(|p| p.id == id).map(|p| {
                p.discount_id = input.discount_id;
                p.seats_purchased = input.seats_purchased;
                p.total_price = input.total_price;
                p.clone()
            }))
        })
    }

    async fn list_by_discount(&self, discount_id: DiscountId) -> Result<Vec<BundlePurchase>> {
        Ok(self.with(|s| {
            s.purchases
                .iter()
                .filter(|p| p.discount_id == Some(discount_id))
                .cloned()
                .collect()
        }))
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        Ok(self.with(|s| {
            let before = s.sessions.len();
            s.sessions.retain(|expires| *expires > now);
            (before - s.sessions.len()) as u64
        }))
    }

    async fn delete_expired_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        Ok(self.with(|s| {
            let before = s.reset_tokens.len();
            s.reset_tokens.retain(|expires| *expires > now);
            (before - s.reset_tokens.len()) as u64
        }))
    }
}

/// Email captured by [`RecordingSender`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Email sender that records deliveries and fails for chosen addresses
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentEmail>>,
    failing: HashSet<String>,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(addresses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            failing: addresses.iter().map(|a| a.to_string()).collect(),
        })
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|e| e.to).collect()
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if self.failing.contains(to) {
            return Err(Error::Transport(format!("Relay rejected {}", to)));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Campaign launcher that records targets and fails for chosen addresses
#[derive(Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<LaunchTarget>>,
    failing: HashSet<String>,
}

impl RecordingLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(addresses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            launched: Mutex::new(Vec::new()),
            failing: addresses.iter().map(|a| a.to_string()).collect(),
        })
    }

    pub fn emails(&self) -> Vec<String> {
        self.launched
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.email.clone())
            .collect()
    }
}

#[async_trait]
impl CampaignLauncher for RecordingLauncher {
    async fn launch(&self, target: &LaunchTarget) -> Result<()> {
        if self.failing.contains(&target.email) {
            return Err(Error::Transport(format!("Platform rejected {}", target.email)));
        }
        self.launched.lock().unwrap().push(target.clone());
        Ok(())
    }
}
