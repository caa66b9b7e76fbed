//! Purchase Service - Discounts and bundle purchases with priced writes

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use trainhub_common::types::{BundleId, DiscountId, PurchaseId, UserId};
use trainhub_common::{Error, Result};
use trainhub_storage::models::{
    Bundle, BundlePurchase, CreateBundlePurchase, CreateDiscount, Discount, RepricedPurchase,
    UpdateBundlePurchase,
};
use trainhub_storage::repository::{BundleRepository, DiscountRepository, PurchaseRepository};

use super::engine::DiscountPricingEngine;

/// Input for a new purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchaseInput {
    pub bundle_id: BundleId,
    pub discount_id: Option<DiscountId>,
    pub seats_purchased: i32,
    pub purchased_by: UserId,
}

/// Input for changing an existing purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePurchaseInput {
    pub discount_id: Option<DiscountId>,
    pub seats_purchased: i32,
}

/// Purchase service
pub struct PurchaseService {
    bundles: Arc<dyn BundleRepository>,
    discounts: Arc<dyn DiscountRepository>,
    purchases: Arc<dyn PurchaseRepository>,
    engine: DiscountPricingEngine,
}

impl PurchaseService {
    pub fn new(
        bundles: Arc<dyn BundleRepository>,
        discounts: Arc<dyn DiscountRepository>,
        purchases: Arc<dyn PurchaseRepository>,
    ) -> Self {
        Self {
            bundles,
            discounts,
            purchases,
            engine: DiscountPricingEngine::new(),
        }
    }

    /// Range and consistency checks for a new discount
    pub fn validate_discount(&self, input: &CreateDiscount, now: DateTime<Utc>) -> Result<()> {
        if input.percentage.is_none() && input.seats_rule.is_none() {
            return Err(Error::Validation(
                "A discount needs a percentage or a seats rule".to_string(),
            ));
        }

        if let Some(percentage) = input.percentage {
            check_percentage("percentage", percentage)?;
        }

        if let Some(rule) = input.seats_rule {
            check_percentage("seats percentage", rule.percentage)?;
            if rule.seats_threshold < 1 {
                return Err(Error::Validation(format!(
                    "Seats threshold must be at least 1, got {}",
                    rule.seats_threshold
                )));
            }
        }

        if let Some(expiry) = input.expiry_date {
            if expiry <= now {
                return Err(Error::Validation(
                    "Expiry date must be in the future".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub async fn create_discount(&self, input: CreateDiscount) -> Result<Discount> {
        self.validate_discount(&input, Utc::now())?;

        if let Some(bundle_id) = input.bundle_id {
            self.bundle(bundle_id).await?;
        }

        let discount = self.discounts.create(input).await?;
        info!("Discount {} created", discount.id);
        Ok(discount)
    }

    /// Price and store a purchase. Nothing is written if pricing fails, or
    /// if the discount was deactivated after it was priced (`StateConflict`).
    pub async fn create_purchase(&self, input: CreatePurchaseInput) -> Result<BundlePurchase> {
        let bundle = self.bundle(input.bundle_id).await?;
        let discount = self.optional_discount(input.discount_id).await?;

        let total_price = self.engine.compute_total_price(
            &bundle,
            input.seats_purchased,
            discount.as_ref(),
            Utc::now(),
        )?;

        let purchase = self
            .purchases
            .create(CreateBundlePurchase {
                bundle_id: bundle.id,
                discount_id: input.discount_id,
                seats_purchased: input.seats_purchased,
                total_price,
                purchased_by: input.purchased_by,
            })
            .await?;

        info!(
            "Purchase {} of bundle {} created: {} seats for {}",
            purchase.id, bundle.id, purchase.seats_purchased, purchase.total_price
        );
        Ok(purchase)
    }

    /// Reprice and store a changed purchase. Nothing is written if pricing fails.
    pub async fn update_purchase(
        &self,
        id: PurchaseId,
        input: UpdatePurchaseInput,
    ) -> Result<BundlePurchase> {
        let existing = self
            .purchases
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Purchase {}", id)))?;
        let bundle = self.bundle(existing.bundle_id).await?;
        let discount = self.optional_discount(input.discount_id).await?;

        let total_price = self.engine.compute_total_price(
            &bundle,
            input.seats_purchased,
            discount.as_ref(),
            Utc::now(),
        )?;

        let updated = self
            .purchases
            .update_pricing(
                id,
                UpdateBundlePurchase {
                    discount_id: input.discount_id,
                    seats_purchased: input.seats_purchased,
                    total_price,
                },
            )
            .await?
            .ok_or_else(|| Error::NotFound(format!("Purchase {}", id)))?;

        info!("Purchase {} repriced to {}", id, updated.total_price);
        Ok(updated)
    }

    /// Deactivate a discount and reprice every purchase that used it at
    /// the undiscounted base price. Returns the number of repriced purchases.
    pub async fn deactivate_discount(&self, id: DiscountId) -> Result<usize> {
        let discount = self
            .discounts
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Discount {}", id)))?;

        if !discount.is_active {
            return Err(Error::StateConflict(format!(
                "Discount {} is already inactive",
                id
            )));
        }

        let purchases = self.purchases.list_by_discount(id).await?;
        let mut bundles: HashMap<BundleId, Bundle> = HashMap::new();
        let mut repriced = Vec::with_capacity(purchases.len());

        for purchase in &purchases {
            if !bundles.contains_key(&purchase.bundle_id) {
                let bundle = self.bundle(purchase.bundle_id).await?;
                bundles.insert(bundle.id, bundle);
            }
            let bundle = bundles
                .get(&purchase.bundle_id)
                .ok_or_else(|| Error::Internal("Bundle cache miss".to_string()))?;

            let total_price = self.engine.compute_total_price(
                bundle,
                purchase.seats_purchased,
                None,
                Utc::now(),
            )?;

            debug!(
                "Purchase {} reprices from {} to {}",
                purchase.id, purchase.total_price, total_price
            );
            repriced.push(RepricedPurchase {
                purchase_id: purchase.id,
                total_price,
            });
        }

        self.discounts
            .deactivate_with_repricing(id, &repriced)
            .await?;

        info!(
            "Discount {} deactivated, {} purchases repriced",
            id,
            repriced.len()
        );
        Ok(repriced.len())
    }

    /// Delete a discount. Purchases keep their price and lose the reference.
    pub async fn delete_discount(&self, id: DiscountId) -> Result<()> {
        if !self.discounts.delete(id).await? {
            return Err(Error::NotFound(format!("Discount {}", id)));
        }
        info!("Discount {} deleted", id);
        Ok(())
    }

    async fn bundle(&self, id: BundleId) -> Result<Bundle> {
        self.bundles
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Bundle {}", id)))
    }

    async fn optional_discount(&self, id: Option<DiscountId>) -> Result<Option<Discount>> {
        match id {
            Some(id) => self
                .discounts
                .get(id)
                .await?
                .map(Some)
                .ok_or_else(|| Error::NotFound(format!("Discount {}", id))),
            None => Ok(None),
        }
    }
}

fn check_percentage(field: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(Error::Validation(format!(
            "{} must be between 0 and 100, got {}",
            field, value
        )));
    }
    Ok(())
}
