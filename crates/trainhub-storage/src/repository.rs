//! Repository layer for data access

pub mod bundles;
pub mod discounts;
pub mod email_templates;
pub mod purchases;
pub mod scheduled_emails;
pub mod sessions;
pub mod simulations;
pub mod users;

pub use bundles::{BundleRepository, DbBundleRepository};
pub use discounts::{DbDiscountRepository, DiscountRepository};
pub use email_templates::{DbEmailTemplateRepository, EmailTemplateRepository};
pub use purchases::{DbPurchaseRepository, PurchaseRepository};
pub use scheduled_emails::{DbScheduledEmailRepository, ScheduledEmailRepository};
pub use sessions::{DbSessionRepository, SessionRepository};
pub use simulations::{DbSimulationRepository, SimulationRepository};
pub use users::{DbUserRepository, UserRepository};
