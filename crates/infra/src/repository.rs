//! Storage capabilities consumed by use cases and queries.
//!
//! Repositories never write. They load aggregates and translate aggregates and outbox
//! records into driver-specific [`Mutation`]s, which a [`Committer`](crate::commit_plan::Committer)
//! later applies as one unit.

use std::sync::Arc;

use async_trait::async_trait;

use catalog_core::ProductId;
use catalog_events::OutboxEvent;
use catalog_products::Product;

use crate::commit_plan::Mutation;
use crate::error::CatalogResult;
use crate::models::ProductView;

/// Loads products and produces their write mutations.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Fails with `DomainError::NotFound` when no row exists.
    async fn find_by_id(&self, id: ProductId) -> CatalogResult<Product>;

    /// Full insert of a newly created product.
    fn insert_mutation(&self, product: &Product) -> Mutation;

    /// Partial update of the product's dirty fields, or `None` when nothing changed.
    fn update_mutation(&self, product: &Product) -> Option<Mutation>;
}

/// Produces outbox inserts.
pub trait OutboxRepository: Send + Sync {
    fn insert_mutation(&self, event: &OutboxEvent) -> Mutation;
}

/// One page of active products ordered by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPage {
    pub views: Vec<ProductView>,
    /// Id to pass as `after` for the next page; `None` when exhausted.
    pub next: Option<ProductId>,
}

impl ViewPage {
    /// Split a result fetched with `limit = page_size + 1` into page and continuation.
    ///
    /// The continuation is the id of the last row kept on the page, so the next
    /// `id > after` query starts with the over-fetched row.
    pub fn from_overfetch(mut views: Vec<ProductView>, page_size: usize) -> Self {
        let next = if page_size > 0 && views.len() > page_size {
            views.truncate(page_size);
            views.last().map(|last| last.id)
        } else {
            None
        };
        Self { views, next }
    }
}

/// Query-side access that bypasses the aggregate.
///
/// `list_active` returns active products with `id > after` (all of them when `after` is
/// `None`), optionally restricted to `category`, ordered by id ascending. Implementations
/// fetch `page_size + 1` rows; when the extra row is present the page's last id becomes
/// the continuation.
#[async_trait]
pub trait ProductReadModel: Send + Sync {
    async fn get_by_id(&self, id: ProductId) -> CatalogResult<ProductView>;

    async fn list_active(
        &self,
        page_size: u32,
        after: Option<ProductId>,
        category: Option<&str>,
    ) -> CatalogResult<ViewPage>;
}

#[async_trait]
impl<R> ProductRepository for Arc<R>
where
    R: ProductRepository + ?Sized,
{
    async fn find_by_id(&self, id: ProductId) -> CatalogResult<Product> {
        (**self).find_by_id(id).await
    }

    fn insert_mutation(&self, product: &Product) -> Mutation {
        (**self).insert_mutation(product)
    }

    fn update_mutation(&self, product: &Product) -> Option<Mutation> {
        (**self).update_mutation(product)
    }
}

impl<R> OutboxRepository for Arc<R>
where
    R: OutboxRepository + ?Sized,
{
    fn insert_mutation(&self, event: &OutboxEvent) -> Mutation {
        (**self).insert_mutation(event)
    }
}

#[async_trait]
impl<R> ProductReadModel for Arc<R>
where
    R: ProductReadModel + ?Sized,
{
    async fn get_by_id(&self, id: ProductId) -> CatalogResult<ProductView> {
        (**self).get_by_id(id).await
    }

    async fn list_active(
        &self,
        page_size: u32,
        after: Option<ProductId>,
        category: Option<&str>,
    ) -> CatalogResult<ViewPage> {
        (**self).list_active(page_size, after, category).await
    }
}
