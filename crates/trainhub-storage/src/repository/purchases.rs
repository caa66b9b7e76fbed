//! Bundle purchase repository

use chrono::Utc;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db::{db_error, DatabasePool};
use crate::models::{BundlePurchase, CreateBundlePurchase, UpdateBundlePurchase};
use async_trait::async_trait;
use trainhub_common::types::{DiscountId, PurchaseId};
use trainhub_common::{Error, Result};

/// Purchase repository trait
///
/// Writes that reference a discount fail with `StateConflict` once the
/// discount is no longer active, so a price computed against an active
/// discount never lands after that discount was deactivated.
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    async fn create(&self, input: CreateBundlePurchase) -> Result<BundlePurchase>;
    async fn get(&self, id: PurchaseId) -> Result<Option<BundlePurchase>>;
    async fn update_pricing(
        &self,
        id: PurchaseId,
        input: UpdateBundlePurchase,
    ) -> Result<Option<BundlePurchase>>;
    async fn list_by_discount(&self, discount_id: DiscountId) -> Result<Vec<BundlePurchase>>;
}

/// Database purchase repository
pub struct DbPurchaseRepository {
    pool: DatabasePool,
}

impl DbPurchaseRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurchaseRepository for DbPurchaseRepository {
    async fn create(&self, input: CreateBundlePurchase) -> Result<BundlePurchase> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut tx = self.pool.pool().begin().await.map_err(db_error)?;

        if let Some(discount_id) = input.discount_id {
            lock_active_discount(&mut tx, discount_id).await?;
        }

        let purchase = sqlx::query_as::<_, BundlePurchase>(
            r#"
            INSERT INTO bundle_purchases (
                id, bundle_id, discount_id, seats_purchased, total_price, purchased_by,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.bundle_id)
        .bind(input.discount_id)
        .bind(input.seats_purchased)
        .bind(input.total_price)
        .bind(input.purchased_by)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(purchase)
    }

    async fn get(&self, id: PurchaseId) -> Result<Option<BundlePurchase>> {
        sqlx::query_as::<_, BundlePurchase>("SELECT * FROM bundle_purchases WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_error)
    }

    async fn update_pricing(
        &self,
        id: PurchaseId,
        input: UpdateBundlePurchase,
    ) -> Result<Option<BundlePurchase>> {
        let mut tx = self.pool.pool().begin().await.map_err(db_error)?;

        if let Some(discount_id) = input.discount_id {
            lock_active_discount(&mut tx, discount_id).await?;
        }

        let updated = sqlx::query_as::<_, BundlePurchase>(
            r#"
            UPDATE bundle_purchases SET
                discount_id = $2,
                seats_purchased = $3,
                total_price = $4,
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.discount_id)
        .bind(input.seats_purchased)
        .bind(input.total_price)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(updated)
    }

    async fn list_by_discount(&self, discount_id: DiscountId) -> Result<Vec<BundlePurchase>> {
        sqlx::query_as::<_, BundlePurchase>(
            "SELECT * FROM bundle_purchases WHERE discount_id = $1 ORDER BY created_at",
        )
        .bind(discount_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_error)
    }
}

/// Share-lock the discount row for the rest of the transaction and require
/// it to be active. Deactivation updates the row, so it waits for this
/// transaction or is waited on; either way it sees the purchase.
async fn lock_active_discount(
    tx: &mut Transaction<'_, Postgres>,
    discount_id: DiscountId,
) -> Result<()> {
    let is_active: Option<bool> =
        sqlx::query_scalar("SELECT is_active FROM discounts WHERE id = $1 FOR SHARE")
            .bind(discount_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error)?;

    match is_active {
        Some(true) => Ok(()),
        Some(false) => Err(Error::StateConflict(format!(
            "Discount {} is no longer active",
            discount_id
        ))),
        None => Err(Error::NotFound(format!("Discount {}", discount_id))),
    }
}
