use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalog_core::{AggregateRoot, DomainResult, ProductId, TransitionError, ValidationError};

use crate::changes::{ChangeTracker, Field};
use crate::discount::Discount;
use crate::event::{
    DiscountApplied, DiscountRemoved, ProductActivated, ProductCreated, ProductDeactivated,
    ProductEvent, ProductUpdated,
};
use crate::money::Money;
use crate::pricing;

/// Product status lifecycle. `Archived` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Inactive,
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
            ProductStatus::Archived => "archived",
        }
    }
}

impl core::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown product status '{0}'")]
pub struct UnknownProductStatus(pub String);

impl FromStr for ProductStatus {
    type Err = UnknownProductStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProductStatus::Active),
            "inactive" => Ok(ProductStatus::Inactive),
            "archived" => Ok(ProductStatus::Archived),
            other => Err(UnknownProductStatus(other.to_string())),
        }
    }
}

/// Persisted state of a product, used to rehydrate the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub base_price: Money,
    pub discount: Option<Discount>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

/// Aggregate root: Product.
///
/// Every mutating method checks all of its preconditions before touching state, so a
/// failed call leaves fields, dirty marks and recorded events exactly as they were.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    description: String,
    category: String,
    base_price: Money,
    discount: Option<Discount>,
    status: ProductStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    archived_at: Option<DateTime<Utc>>,

    changes: ChangeTracker,
    events: Vec<ProductEvent>,
}

/// Whitespace-only names count as empty.
fn require_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::NameRequired.into());
    }
    Ok(())
}

/// Whitespace-only categories count as empty.
fn require_category(category: &str) -> DomainResult<()> {
    if category.trim().is_empty() {
        return Err(ValidationError::CategoryRequired.into());
    }
    Ok(())
}

impl Product {
    /// Create an active product and record `ProductCreated`.
    pub fn create(
        id: ProductId,
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        base_price: Money,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        let category = category.into();
        require_name(&name)?;
        require_category(&category)?;

        let mut product = Self {
            id,
            name,
            description: description.into(),
            category,
            base_price,
            discount: None,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
            archived_at: None,
            changes: ChangeTracker::new(),
            events: Vec::new(),
        };

        let created = ProductCreated {
            product_id: id,
            name: product.name.clone(),
            category: product.category.clone(),
            occurred_at: now,
        };
        product.events.push(ProductEvent::ProductCreated(created));

        Ok(product)
    }

    /// Rebuild from storage: no events, nothing dirty.
    pub fn reconstitute(snapshot: ProductSnapshot) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name,
            description: snapshot.description,
            category: snapshot.category,
            base_price: snapshot.base_price,
            discount: snapshot.discount,
            status: snapshot.status,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            archived_at: snapshot.archived_at,
            changes: ChangeTracker::new(),
            events: Vec::new(),
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn base_price(&self) -> &Money {
        &self.base_price
    }

    pub fn discount(&self) -> Option<&Discount> {
        self.discount.as_ref()
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn archived_at(&self) -> Option<DateTime<Utc>> {
        self.archived_at
    }

    pub fn changes(&self) -> &ChangeTracker {
        &self.changes
    }

    /// Base price after any discount active at `now`.
    pub fn effective_price(&self, now: DateTime<Utc>) -> Money {
        pricing::effective_price(&self.base_price, self.discount.as_ref(), now)
    }

    /// Replace name, description and category. Only fields that differ are touched.
    pub fn update_details(
        &mut self,
        name: &str,
        description: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_not_archived()?;
        require_name(name)?;
        require_category(category)?;

        let mut changed = false;
        if name != self.name {
            self.name = name.to_string();
            self.changes.mark_dirty(Field::Name);
            changed = true;
        }
        if description != self.description {
            self.description = description.to_string();
            self.changes.mark_dirty(Field::Description);
            changed = true;
        }
        if category != self.category {
            self.category = category.to_string();
            self.changes.mark_dirty(Field::Category);
            changed = true;
        }

        if changed {
            self.record_update(now);
        }
        Ok(())
    }

    /// Reprice. A price equal by value is a no-op.
    pub fn change_base_price(&mut self, price: Money, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_not_archived()?;

        if price == self.base_price {
            return Ok(());
        }
        self.base_price = price;
        self.changes.mark_dirty(Field::BasePrice);
        self.record_update(now);
        Ok(())
    }

    pub fn activate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_not_archived()?;
        if self.status == ProductStatus::Active {
            return Err(TransitionError::AlreadyActive.into());
        }

        self.status = ProductStatus::Active;
        self.updated_at = now;
        self.changes.mark_dirty(Field::Status);
        self.events.push(ProductEvent::ProductActivated(ProductActivated {
            product_id: self.id,
            occurred_at: now,
        }));
        Ok(())
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_not_archived()?;
        if self.status != ProductStatus::Active {
            return Err(TransitionError::AlreadyInactive.into());
        }

        self.status = ProductStatus::Inactive;
        self.updated_at = now;
        self.changes.mark_dirty(Field::Status);
        self.events
            .push(ProductEvent::ProductDeactivated(ProductDeactivated {
                product_id: self.id,
                occurred_at: now,
            }));
        Ok(())
    }

    /// Move to the terminal state. Records no event.
    pub fn archive(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_not_archived()?;

        self.status = ProductStatus::Archived;
        self.updated_at = now;
        self.archived_at = Some(now);
        self.changes.mark_dirty(Field::Status);
        Ok(())
    }

    pub fn apply_discount(&mut self, discount: Discount, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_not_archived()?;
        if self.status != ProductStatus::Active {
            return Err(TransitionError::NotActive.into());
        }
        if !discount.is_valid_at(now) {
            return Err(TransitionError::DiscountNotActive.into());
        }

        let applied = DiscountApplied {
            product_id: self.id,
            percentage: discount.percentage().clone(),
            starts_at: discount.starts_at(),
            ends_at: discount.ends_at(),
            occurred_at: now,
        };
        self.discount = Some(discount);
        self.updated_at = now;
        self.changes.mark_dirty(Field::Discount);
        self.events.push(ProductEvent::DiscountApplied(applied));
        Ok(())
    }

    pub fn remove_discount(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_not_archived()?;
        if self.discount.is_none() {
            return Err(TransitionError::NoActiveDiscount.into());
        }

        self.discount = None;
        self.updated_at = now;
        self.changes.mark_dirty(Field::Discount);
        self.events.push(ProductEvent::DiscountRemoved(DiscountRemoved {
            product_id: self.id,
            occurred_at: now,
        }));
        Ok(())
    }

    fn ensure_not_archived(&self) -> DomainResult<()> {
        if self.status == ProductStatus::Archived {
            return Err(TransitionError::Archived.into());
        }
        Ok(())
    }

    fn record_update(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.events.push(ProductEvent::ProductUpdated(ProductUpdated {
            product_id: self.id,
            occurred_at: now,
        }));
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;
    type Event = ProductEvent;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn pending_events(&self) -> &[Self::Event] {
        &self.events
    }

    fn take_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.events)
    }
}
