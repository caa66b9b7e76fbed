//! Database connection and pool management

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;
use trainhub_common::config::DatabaseConfig;
use trainhub_common::{Error, Result};

/// Database pool wrapper
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = Self::build_url(config)?;

        info!(
            backend = %config.backend,
            "Connecting to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect: {}", e)))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build database URL from configuration
    fn build_url(config: &DatabaseConfig) -> Result<String> {
        match config.backend.as_str() {
            "postgres" => config
                .url
                .clone()
                .ok_or_else(|| Error::Config("Database URL required for PostgreSQL".to_string())),
            other => Err(Error::Config(format!(
                "Unsupported database backend: {} (only PostgreSQL is supported)",
                other
            ))),
        }
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }
}

/// Database trait for type-safe queries
pub trait Database: Send + Sync {
    /// Get the pool
    fn pool(&self) -> &PgPool;
}

impl Database for DatabasePool {
    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Convert a driver error into the shared error type
pub(crate) fn db_error(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend: &str, url: Option<&str>) -> DatabaseConfig {
        DatabaseConfig {
            backend: backend.to_string(),
            url: url.map(str::to_string),
            max_connections: 5,
            min_connections: 1,
        }
    }

    #[test]
    fn test_build_url_postgres() {
        let url = DatabasePool::build_url(&config("postgres", Some("postgres://localhost/th"))).unwrap();
        assert_eq!(url, "postgres://localhost/th");
    }

    #[test]
    fn test_build_url_requires_url() {
        assert!(matches!(
            DatabasePool::build_url(&config("postgres", None)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_build_url_rejects_other_backends() {
        assert!(DatabasePool::build_url(&config("sqlite", Some("sqlite::memory:"))).is_err());
    }
}
