//! Bundle repository

use crate::db::{db_error, DatabasePool};
use crate::models::Bundle;
use async_trait::async_trait;
use trainhub_common::types::BundleId;
use trainhub_common::Result;

/// Bundle repository trait
#[async_trait]
pub trait BundleRepository: Send + Sync {
    async fn get(&self, id: BundleId) -> Result<Option<Bundle>>;
}

/// Database bundle repository
pub struct DbBundleRepository {
    pool: DatabasePool,
}

impl DbBundleRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BundleRepository for DbBundleRepository {
    async fn get(&self, id: BundleId) -> Result<Option<Bundle>> {
        sqlx::query_as::<_, Bundle>("SELECT * FROM bundles WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_error)
    }
}
