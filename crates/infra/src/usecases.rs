//! Write-side use cases (application-level orchestration).
//!
//! Every use case follows the same pipeline:
//!
//! ```text
//! input
//!   ↓
//! 1. Load the product (or create it)
//!   ↓
//! 2. Invoke the aggregate operation with clock.now()
//!   ↓
//! 3. Plan: state mutation + one outbox insert per pending event
//!   ↓
//! 4. Apply the plan atomically via the Committer, under the commit deadline
//! ```
//!
//! A failure at any step leaves no durable effect. The in-memory aggregate is dropped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use num_rational::BigRational;
use tracing::{Span, instrument};

use catalog_core::{AggregateRoot, Clock, DomainResult, ProductId};
use catalog_products::{Discount, Money, Product};

use crate::commit_plan::{CommitPlan, Committer, Mutation};
use crate::config::CatalogConfig;
use crate::error::{CatalogResult, StoreError};
use crate::outbox::enrich;
use crate::repository::{OutboxRepository, ProductRepository};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProduct {
    pub name: String,
    pub description: String,
    pub category: String,
    pub base_price: BigRational,
}

/// Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyDiscount {
    pub percentage: BigRational,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Product command handlers over injected repositories, committer and clock.
#[derive(Debug)]
pub struct ProductCommands<R, O, C, K> {
    products: R,
    outbox: O,
    committer: C,
    clock: K,
    commit_timeout: Duration,
}

impl<R, O, C, K> ProductCommands<R, O, C, K> {
    pub fn new(products: R, outbox: O, committer: C, clock: K) -> Self {
        Self {
            products,
            outbox,
            committer,
            clock,
            commit_timeout: CatalogConfig::default().commit_timeout,
        }
    }

    pub fn with_config(mut self, config: &CatalogConfig) -> Self {
        self.commit_timeout = config.commit_timeout;
        self
    }

    pub fn into_parts(self) -> (R, O, C, K) {
        (self.products, self.outbox, self.committer, self.clock)
    }
}

impl<R, O, C, K> ProductCommands<R, O, C, K>
where
    R: ProductRepository,
    O: OutboxRepository,
    C: Committer,
    K: Clock,
{
    #[instrument(skip(self, input), fields(product_id = tracing::field::Empty), err)]
    pub async fn create_product(&self, input: CreateProduct) -> CatalogResult<ProductId> {
        let id = ProductId::new();
        Span::current().record("product_id", tracing::field::display(id));

        let base_price = Money::from_rational(input.base_price)?;
        let mut product = Product::create(
            id,
            input.name,
            input.description,
            input.category,
            base_price,
            self.clock.now(),
        )?;

        let insert = self.products.insert_mutation(&product);
        let plan = self.plan(insert, &mut product);
        self.commit(plan).await?;
        Ok(id)
    }

    #[instrument(skip(self, id, input), fields(product_id = %id), err)]
    pub async fn update_product(&self, id: ProductId, input: UpdateProduct) -> CatalogResult<()> {
        self.modify(id, move |product, now| {
            let name = input.name.unwrap_or_else(|| product.name().to_string());
            let description = input
                .description
                .unwrap_or_else(|| product.description().to_string());
            let category = input
                .category
                .unwrap_or_else(|| product.category().to_string());
            product.update_details(&name, &description, &category, now)
        })
        .await
    }

    #[instrument(skip(self, id, price), fields(product_id = %id), err)]
    pub async fn change_price(&self, id: ProductId, price: BigRational) -> CatalogResult<()> {
        let price = Money::from_rational(price)?;
        self.modify(id, move |product, now| product.change_base_price(price, now))
            .await
    }

    #[instrument(skip(self, id), fields(product_id = %id), err)]
    pub async fn activate(&self, id: ProductId) -> CatalogResult<()> {
        self.modify(id, |product, now| product.activate(now)).await
    }

    #[instrument(skip(self, id), fields(product_id = %id), err)]
    pub async fn deactivate(&self, id: ProductId) -> CatalogResult<()> {
        self.modify(id, |product, now| product.deactivate(now)).await
    }

    /// The resulting plan holds the state mutation only; archiving records no event.
    #[instrument(skip(self, id), fields(product_id = %id), err)]
    pub async fn archive(&self, id: ProductId) -> CatalogResult<()> {
        self.modify(id, |product, now| product.archive(now)).await
    }

    #[instrument(skip(self, id, input), fields(product_id = %id), err)]
    pub async fn apply_discount(&self, id: ProductId, input: ApplyDiscount) -> CatalogResult<()> {
        let discount = Discount::new(input.percentage, input.starts_at, input.ends_at)?;
        self.modify(id, move |product, now| product.apply_discount(discount, now))
            .await
    }

    #[instrument(skip(self, id), fields(product_id = %id), err)]
    pub async fn remove_discount(&self, id: ProductId) -> CatalogResult<()> {
        self.modify(id, |product, now| product.remove_discount(now))
            .await
    }

    /// Load, mutate, then flush whatever changed.
    async fn modify<F>(&self, id: ProductId, operation: F) -> CatalogResult<()>
    where
        F: FnOnce(&mut Product, DateTime<Utc>) -> DomainResult<()>,
    {
        let mut product = self.products.find_by_id(id).await?;
        operation(&mut product, self.clock.now())?;

        let update = self.products.update_mutation(&product);
        let plan = self.plan(update, &mut product);
        self.commit(plan).await
    }

    fn plan(&self, state: impl Into<Option<Mutation>>, product: &mut Product) -> CommitPlan {
        let aggregate_id = product.product_id().aggregate_id();

        let mut plan = CommitPlan::new();
        plan.add(state);
        for event in product.take_events() {
            plan.add(self.outbox.insert_mutation(&enrich(aggregate_id, &event)));
        }
        plan
    }

    async fn commit(&self, plan: CommitPlan) -> CatalogResult<()> {
        let deadline = self.commit_timeout;
        tokio::time::timeout(deadline, self.committer.apply(plan))
            .await
            .map_err(|_| StoreError::Timeout(deadline))??;
        Ok(())
    }
}
