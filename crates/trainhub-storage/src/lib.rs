//! TrainHub Storage - Database access for the delivery core
//!
//! This crate provides the PostgreSQL pool, the row models, and one
//! repository trait per aggregate together with its sqlx implementation.

pub mod db;
pub mod models;
pub mod repository;

pub use db::{Database, DatabasePool};
pub use models::*;
pub use repository::*;
