//! Discount Pricing Engine - Final price of a bundle purchase

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use trainhub_common::types::{BundleId, DiscountId};
use trainhub_common::Error;
use trainhub_storage::models::{Bundle, Discount};

/// Pricing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("Seat count must be at least 1, got {0}")]
    InvalidSeatCount(i32),

    #[error("Discount {0} is inactive")]
    DiscountInactive(DiscountId),

    #[error("Discount {0} has expired")]
    DiscountExpired(DiscountId),

    #[error("Discount {discount} requires at least {threshold} seats, got {seats}")]
    SeatsThresholdNotMet {
        discount: DiscountId,
        threshold: i32,
        seats: i32,
    },

    #[error("Discount {discount} does not apply to bundle {bundle}")]
    DiscountBundleMismatch {
        discount: DiscountId,
        bundle: BundleId,
    },

    #[error("Discount {0} defines neither a percentage nor a seats rule")]
    DiscountMisconfigured(DiscountId),
}

impl From<PricingError> for Error {
    fn from(e: PricingError) -> Self {
        Error::Validation(e.to_string())
    }
}

/// Stateless price calculator
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscountPricingEngine;

impl DiscountPricingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Price of `seats` seats of `bundle`, with an optional discount applied.
    ///
    /// A satisfied seats rule wins over the flat percentage. The flat
    /// percentage is the fallback when the seats threshold is not reached.
    /// The result always carries exactly two decimal places.
    pub fn compute_total_price(
        &self,
        bundle: &Bundle,
        seats: i32,
        discount: Option<&Discount>,
        now: DateTime<Utc>,
    ) -> Result<Decimal, PricingError> {
        if seats < 1 {
            return Err(PricingError::InvalidSeatCount(seats));
        }

        let base = Decimal::from(seats) * bundle.seat_price;

        let Some(discount) = discount else {
            return Ok(to_cents(base));
        };

        if !discount.is_active {
            return Err(PricingError::DiscountInactive(discount.id));
        }
        if discount.is_expired_at(now) {
            return Err(PricingError::DiscountExpired(discount.id));
        }

        let percentage = match (discount.seats_rule(), discount.percentage) {
            (Some(rule), _) if seats >= rule.seats_threshold => rule.percentage,
            (_, Some(flat)) => {
                if let Some(bound) = discount.bundle_id {
                    if bound != bundle.id {
                        return Err(PricingError::DiscountBundleMismatch {
                            discount: discount.id,
                            bundle: bundle.id,
                        });
                    }
                }
                flat
            }
            (Some(rule), None) => {
                return Err(PricingError::SeatsThresholdNotMet {
                    discount: discount.id,
                    threshold: rule.seats_threshold,
                    seats,
                })
            }
            (None, None) => return Err(PricingError::DiscountMisconfigured(discount.id)),
        };

        Ok(apply_percentage(base, percentage))
    }
}

fn apply_percentage(base: Decimal, percentage: Decimal) -> Decimal {
    to_cents(base * (Decimal::ONE_HUNDRED - percentage) / Decimal::ONE_HUNDRED)
}

fn to_cents(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}
