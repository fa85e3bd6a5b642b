//! Products domain module (state-stored aggregate that records events).
//!
//! This crate contains business rules for the catalog, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod changes;
pub mod discount;
pub mod event;
pub mod money;
pub mod pricing;
pub mod product;

pub use changes::{ChangeTracker, Field};
pub use discount::Discount;
pub use event::{
    DiscountApplied, DiscountRemoved, ProductActivated, ProductCreated, ProductDeactivated,
    ProductEvent, ProductUpdated,
};
pub use money::{Money, format_decimal};
pub use pricing::effective_price;
pub use product::{Product, ProductSnapshot, ProductStatus, UnknownProductStatus};

pub use num_bigint::BigInt;
pub use num_rational::BigRational;
