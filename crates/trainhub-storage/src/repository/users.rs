//! User repository

use crate::db::{db_error, DatabasePool};
use crate::models::User;
use async_trait::async_trait;
use trainhub_common::types::{GroupId, UserId};
use trainhub_common::Result;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: UserId) -> Result<Option<User>>;
    /// Users with the given ids, active or not
    async fn list_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>>;
    /// Distinct members of any of the given groups, active or not
    async fn list_group_members(&self, group_ids: &[GroupId]) -> Result<Vec<User>>;
}

/// Database user repository
pub struct DbUserRepository {
    pool: DatabasePool,
}

impl DbUserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for DbUserRepository {
    async fn get(&self, id: UserId) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_error)
    }

    async fn list_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1) ORDER BY email")
            .bind(ids)
            .fetch_all(self.pool.pool())
            .await
            .map_err(db_error)
    }

    async fn list_group_members(&self, group_ids: &[GroupId]) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            WHERE EXISTS (
                SELECT 1 FROM group_members gm
                WHERE gm.user_id = u.id AND gm.group_id = ANY($1)
            )
            ORDER BY u.email
            "#,
        )
        .bind(group_ids)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_error)
    }
}
