//! Pricing Module - Discount pricing engine and purchase service

mod engine;
mod service;

pub use engine::{DiscountPricingEngine, PricingError};
pub use service::{CreatePurchaseInput, PurchaseService, UpdatePurchaseInput};
