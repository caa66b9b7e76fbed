//! Attack Simulation Module - Scheduled phishing campaign launches

mod dispatcher;
mod launch_time;
mod launcher;
mod manager;

pub use dispatcher::{AttackSimulationDispatcher, LaunchOutcome};
pub use launch_time::{resolve_launch_at, LaunchTimeError};
pub use launcher::{CampaignLauncher, HttpCampaignLauncher, LaunchTarget};
pub use manager::{CreateSimulationInput, SimulationManager, UpdateSimulationInput};
