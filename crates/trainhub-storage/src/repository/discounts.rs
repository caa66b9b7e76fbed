//! Discount repository

use chrono::Utc;
use uuid::Uuid;

use crate::db::{db_error, DatabasePool};
use crate::models::{CreateDiscount, Discount, RepricedPurchase};
use async_trait::async_trait;
use trainhub_common::types::DiscountId;
use trainhub_common::{Error, Result};

/// Discount repository trait
#[async_trait]
pub trait DiscountRepository: Send + Sync {
    async fn create(&self, input: CreateDiscount) -> Result<Discount>;

    async fn get(&self, id: DiscountId) -> Result<Option<Discount>>;

    /// Delete the discount; referencing purchases keep their price and
    /// lose the reference. Returns false when nothing was deleted.
    async fn delete(&self, id: DiscountId) -> Result<bool>;

    /// Deactivate the discount, write every repriced purchase and clear
    /// their discount reference in a single transaction. Any row that
    /// changed since the caller read it rolls the whole change back.
    async fn deactivate_with_repricing(
        &self,
        id: DiscountId,
        repriced: &[RepricedPurchase],
    ) -> Result<()>;
}

/// Database discount repository
pub struct DbDiscountRepository {
    pool: DatabasePool,
}

impl DbDiscountRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiscountRepository for DbDiscountRepository {
    async fn create(&self, input: CreateDiscount) -> Result<Discount> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        sqlx::query_as::<_, Discount>(
            r#"
            INSERT INTO discounts (
                id, bundle_id, percentage, seats_percentage, seats_threshold,
                expiry_date, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, true, $7, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.bundle_id)
        .bind(input.percentage)
        .bind(input.seats_rule.map(|r| r.percentage))
        .bind(input.seats_rule.map(|r| r.seats_threshold))
        .bind(input.expiry_date)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_error)
    }

    async fn get(&self, id: DiscountId) -> Result<Option<Discount>> {
        sqlx::query_as::<_, Discount>("SELECT * FROM discounts WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_error)
    }

    async fn delete(&self, id: DiscountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM discounts WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_with_repricing(
        &self,
        id: DiscountId,
        repriced: &[RepricedPurchase],
    ) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.pool().begin().await.map_err(db_error)?;

        let deactivated = sqlx::query(
            r#"
            UPDATE discounts SET
                is_active = false,
                updated_at = $2
            WHERE id = $1 AND is_active = true
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if deactivated.rows_affected() != 1 {
            tx.rollback().await.map_err(db_error)?;
            return Err(Error::StateConflict(format!(
                "Discount {} is no longer active",
                id
            )));
        }

        for purchase in repriced {
            let updated = sqlx::query(
                r#"
                UPDATE bundle_purchases SET
                    total_price = $3,
                    discount_id = NULL,
                    updated_at = $4
                WHERE id = $1 AND discount_id = $2
                "#,
            )
            .bind(purchase.purchase_id)
            .bind(id)
            .bind(purchase.total_price)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

            if updated.rows_affected() != 1 {
                tx.rollback().await.map_err(db_error)?;
                return Err(Error::StateConflict(format!(
                    "Purchase {} changed while discount {} was being deactivated",
                    purchase.purchase_id, id
                )));
            }
        }

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bundle_purchases WHERE discount_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error)?;

        if remaining > 0 {
            tx.rollback().await.map_err(db_error)?;
            return Err(Error::StateConflict(format!(
                "{} new purchase(s) reference discount {}",
                remaining, id
            )));
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}
