//! Read-side queries. These go through the read model and never load the aggregate.

use chrono::{DateTime, Utc};
use tracing::instrument;

use catalog_core::{Clock, DomainResult, ProductId, ValidationError};
use catalog_products::{ProductStatus, effective_price};

use crate::config::CatalogConfig;
use crate::error::CatalogResult;
use crate::models::ProductView;
use crate::repository::ProductReadModel;

/// Single-product view with prices rendered to two decimals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDetails {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub base_price: String,
    pub effective_price: String,
    /// Attached discount percentage, e.g. "25.00", whether or not it is active right now.
    pub discount_percent: Option<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub base_price: String,
    pub effective_price: String,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPage {
    pub items: Vec<ProductSummary>,
    /// Pass back as `page_token` to continue. `None` means no further pages.
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListProducts {
    /// 0 selects the configured default.
    pub page_size: u32,
    /// Empty or absent starts from the beginning.
    pub page_token: Option<String>,
    /// Empty or absent lists every category.
    pub category: Option<String>,
}

#[derive(Debug)]
pub struct ProductQueries<M, K> {
    read_model: M,
    clock: K,
    config: CatalogConfig,
}

impl<M, K> ProductQueries<M, K> {
    pub fn new(read_model: M, clock: K) -> Self {
        Self {
            read_model,
            clock,
            config: CatalogConfig::default(),
        }
    }

    pub fn with_config(mut self, config: &CatalogConfig) -> Self {
        self.config = config.clone();
        self
    }
}

impl<M, K> ProductQueries<M, K>
where
    M: ProductReadModel,
    K: Clock,
{
    #[instrument(skip(self, id), fields(product_id = %id), err)]
    pub async fn get_product(&self, id: ProductId) -> CatalogResult<ProductDetails> {
        let view = self.read_model.get_by_id(id).await?;
        let now = self.clock.now();

        Ok(ProductDetails {
            effective_price: effective_price(&view.base_price, view.discount.as_ref(), now)
                .format(),
            base_price: view.base_price.format(),
            discount_percent: view.discount.as_ref().map(|d| d.percentage_display()),
            id: view.id,
            name: view.name,
            description: view.description,
            category: view.category,
            status: view.status,
            created_at: view.created_at,
            updated_at: view.updated_at,
            archived_at: view.archived_at,
        })
    }

    #[instrument(skip(self), err)]
    pub async fn list_products(&self, input: ListProducts) -> CatalogResult<ProductPage> {
        let page_size = self.config.page_size(input.page_size);
        let after = parse_page_token(input.page_token.as_deref())?;
        let category = input.category.as_deref().filter(|c| !c.is_empty());

        let page = self
            .read_model
            .list_active(page_size, after, category)
            .await?;

        let now = self.clock.now();
        Ok(ProductPage {
            items: page
                .views
                .into_iter()
                .map(|view| summarize(view, now))
                .collect(),
            next_page_token: page.next.map(|id| id.to_string()),
        })
    }
}

fn parse_page_token(token: Option<&str>) -> DomainResult<Option<ProductId>> {
    match token.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<ProductId>()
            .map(Some)
            .map_err(|_| ValidationError::InvalidPageToken(raw.to_string()).into()),
    }
}

fn summarize(view: ProductView, now: DateTime<Utc>) -> ProductSummary {
    ProductSummary {
        effective_price: effective_price(&view.base_price, view.discount.as_ref(), now).format(),
        base_price: view.base_price.format(),
        id: view.id,
        name: view.name,
        category: view.category,
        status: view.status,
        created_at: view.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::DomainError;

    #[test]
    fn blank_tokens_start_from_the_beginning() {
        assert_eq!(parse_page_token(None), Ok(None));
        assert_eq!(parse_page_token(Some("")), Ok(None));
        assert_eq!(parse_page_token(Some("  ")), Ok(None));
    }

    #[test]
    fn tokens_are_product_ids() {
        let id = ProductId::new();
        assert_eq!(parse_page_token(Some(&id.to_string())), Ok(Some(id)));
        assert_eq!(
            parse_page_token(Some("page-2")),
            Err(DomainError::Validation(ValidationError::InvalidPageToken(
                "page-2".to_string()
            )))
        );
    }
}
