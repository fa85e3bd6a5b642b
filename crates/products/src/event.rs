use chrono::{DateTime, Utc};
use num_rational::BigRational;
use serde::{Deserialize, Serialize};

use catalog_core::{AggregateId, ProductId};
use catalog_events::Event;

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductUpdated (details or base price changed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductActivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductActivated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeactivated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DiscountApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountApplied {
    pub product_id: ProductId,
    pub percentage: BigRational,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DiscountRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRemoved {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Everything that can happen to a product.
///
/// Marked `non_exhaustive`: consumers outside this crate must handle variants they do
/// not know about yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    ProductActivated(ProductActivated),
    ProductDeactivated(ProductDeactivated),
    DiscountApplied(DiscountApplied),
    DiscountRemoved(DiscountRemoved),
}

impl ProductEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductUpdated(e) => e.product_id,
            ProductEvent::ProductActivated(e) => e.product_id,
            ProductEvent::ProductDeactivated(e) => e.product_id,
            ProductEvent::DiscountApplied(e) => e.product_id,
            ProductEvent::DiscountRemoved(e) => e.product_id,
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "product.created",
            ProductEvent::ProductUpdated(_) => "product.updated",
            ProductEvent::ProductActivated(_) => "product.activated",
            ProductEvent::ProductDeactivated(_) => "product.deactivated",
            ProductEvent::DiscountApplied(_) => "discount.applied",
            ProductEvent::DiscountRemoved(_) => "discount.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::ProductActivated(e) => e.occurred_at,
            ProductEvent::ProductDeactivated(e) => e.occurred_at,
            ProductEvent::DiscountApplied(e) => e.occurred_at,
            ProductEvent::DiscountRemoved(e) => e.occurred_at,
        }
    }

    fn aggregate_id(&self) -> AggregateId {
        self.product_id().aggregate_id()
    }
}
