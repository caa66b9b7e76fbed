//! Scheduled Email Module - Template rendering, recipients and dispatch

mod dispatcher;
mod manager;
mod recipients;
mod sender;
mod template;

pub use dispatcher::{DispatchOutcome, ScheduledEmailDispatcher};
pub use manager::{CreateScheduleInput, ScheduleManager};
pub use recipients::RecipientResolver;
pub use sender::{EmailSender, SmtpEmailSender};
pub use template::{parse_subject_pairs, TemplateRenderer, TemplateVars};
