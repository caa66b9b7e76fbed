//! TrainHub API - Operator admin endpoint
//!
//! This crate provides the private HTTP surface used by operators to run
//! the delivery jobs on demand, check health and scrape metrics.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, HealthCheck, JobRunner};
