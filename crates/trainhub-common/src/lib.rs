//! TrainHub Common - Shared types and utilities
//!
//! This crate provides configuration, the error taxonomy, and the id aliases
//! shared across all TrainHub components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
