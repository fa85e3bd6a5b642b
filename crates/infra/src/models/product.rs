use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Zero;
use uuid::Uuid;

use catalog_core::ProductId;
use catalog_products::{
    ChangeTracker, Discount, Field, Money, Product, ProductSnapshot, ProductStatus,
};

use crate::error::StoreError;

pub const TABLE: &str = "products";

/// Column names of the `products` table.
pub mod columns {
    pub const PRODUCT_ID: &str = "product_id";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const CATEGORY: &str = "category";
    pub const BASE_PRICE_NUMERATOR: &str = "base_price_numerator";
    pub const BASE_PRICE_DENOMINATOR: &str = "base_price_denominator";
    pub const DISCOUNT_PERCENT_NUMERATOR: &str = "discount_percent_numerator";
    pub const DISCOUNT_PERCENT_DENOMINATOR: &str = "discount_percent_denominator";
    pub const DISCOUNT_START_DATE: &str = "discount_start_date";
    pub const DISCOUNT_END_DATE: &str = "discount_end_date";
    pub const STATUS: &str = "status";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const ARCHIVED_AT: &str = "archived_at";

    /// Every column, in table order.
    pub const ALL: [&str; 14] = [
        PRODUCT_ID,
        NAME,
        DESCRIPTION,
        CATEGORY,
        BASE_PRICE_NUMERATOR,
        BASE_PRICE_DENOMINATOR,
        DISCOUNT_PERCENT_NUMERATOR,
        DISCOUNT_PERCENT_DENOMINATOR,
        DISCOUNT_START_DATE,
        DISCOUNT_END_DATE,
        STATUS,
        CREATED_AT,
        UPDATED_AT,
        ARCHIVED_AT,
    ];
}

/// The four discount columns, which are either all set or all null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountColumns {
    pub percent_numerator: BigInt,
    pub percent_denominator: BigInt,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl DiscountColumns {
    pub fn from_discount(discount: &Discount) -> Self {
        Self {
            percent_numerator: discount.percentage().numer().clone(),
            percent_denominator: discount.percentage().denom().clone(),
            start_date: discount.starts_at(),
            end_date: discount.ends_at(),
        }
    }

    /// Pair up the nullable columns as read from storage.
    pub fn from_nullable(
        percent_numerator: Option<BigInt>,
        percent_denominator: Option<BigInt>,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<Option<Self>, StoreError> {
        match (percent_numerator, percent_denominator, start_date, end_date) {
            (None, None, None, None) => Ok(None),
            (Some(percent_numerator), Some(percent_denominator), Some(start_date), Some(end_date)) => {
                Ok(Some(Self {
                    percent_numerator,
                    percent_denominator,
                    start_date,
                    end_date,
                }))
            }
            _ => Err(StoreError::Decode(
                "discount columns are only partially set".to_string(),
            )),
        }
    }

    pub fn into_discount(self) -> Result<Discount, StoreError> {
        let percentage = rational(self.percent_numerator, self.percent_denominator)?;
        Discount::new(percentage, self.start_date, self.end_date)
            .map_err(|e| StoreError::Decode(format!("stored discount: {e}")))
    }
}

fn rational(numerator: BigInt, denominator: BigInt) -> Result<BigRational, StoreError> {
    if denominator.is_zero() {
        return Err(StoreError::Decode("zero denominator".to_string()));
    }
    Ok(BigRational::new(numerator, denominator))
}

fn parse_status(raw: &str) -> Result<ProductStatus, StoreError> {
    raw.parse::<ProductStatus>()
        .map_err(|e| StoreError::Decode(e.to_string()))
}

/// One row of the `products` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub product_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub base_price_numerator: BigInt,
    pub base_price_denominator: BigInt,
    pub discount: Option<DiscountColumns>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl ProductRow {
    /// Full row for a newly created product.
    pub fn from_aggregate(product: &Product) -> Self {
        Self {
            product_id: *product.product_id().as_uuid(),
            name: product.name().to_string(),
            description: product.description().to_string(),
            category: product.category().to_string(),
            base_price_numerator: product.base_price().numerator().clone(),
            base_price_denominator: product.base_price().denominator().clone(),
            discount: product.discount().map(DiscountColumns::from_discount),
            status: product.status().as_str().to_string(),
            created_at: product.created_at(),
            updated_at: product.updated_at(),
            archived_at: product.archived_at(),
        }
    }

    pub fn id(&self) -> ProductId {
        ProductId::from_uuid(self.product_id)
    }

    /// Rehydrate the aggregate. The result has no pending events and nothing dirty.
    pub fn into_product(self) -> Result<Product, StoreError> {
        let base_price = Money::from_parts(self.base_price_numerator, self.base_price_denominator)
            .map_err(|e| StoreError::Decode(format!("stored base price: {e}")))?;
        let discount = self.discount.map(DiscountColumns::into_discount).transpose()?;

        Ok(Product::reconstitute(ProductSnapshot {
            id: ProductId::from_uuid(self.product_id),
            name: self.name,
            description: self.description,
            category: self.category,
            base_price,
            discount,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            archived_at: self.archived_at,
        }))
    }

    /// Flat view for queries, bypassing the aggregate.
    pub fn into_view(self) -> Result<ProductView, StoreError> {
        Ok(ProductView {
            id: ProductId::from_uuid(self.product_id),
            base_price: Money::from_parts(self.base_price_numerator, self.base_price_denominator)
                .map_err(|e| StoreError::Decode(format!("stored base price: {e}")))?,
            discount: self.discount.map(DiscountColumns::into_discount).transpose()?,
            status: parse_status(&self.status)?,
            name: self.name,
            description: self.description,
            category: self.category,
            created_at: self.created_at,
            updated_at: self.updated_at,
            archived_at: self.archived_at,
        })
    }
}

/// Read-side projection of a product row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductView {
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

/// Partial update built from a product's dirty fields.
///
/// `None` means "leave the column alone". For the discount, `Some(None)` clears the four
/// discount columns. `updated_at` is always written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPatch {
    pub product_id: Uuid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub base_price: Option<(BigInt, BigInt)>,
    pub discount: Option<Option<DiscountColumns>>,
    pub status: Option<(String, Option<DateTime<Utc>>)>,
    pub updated_at: DateTime<Utc>,
}

impl ProductPatch {
    /// `None` when the product has no dirty fields.
    pub fn from_aggregate(product: &Product) -> Option<Self> {
        Self::from_changes(product, product.changes())
    }

    fn from_changes(product: &Product, changes: &ChangeTracker) -> Option<Self> {
        if !changes.has_changes() {
            return None;
        }

        let mut patch = Self {
            product_id: *product.product_id().as_uuid(),
            name: None,
            description: None,
            category: None,
            base_price: None,
            discount: None,
            status: None,
            updated_at: product.updated_at(),
        };

        for field in changes.dirty_fields() {
            match field {
                Field::Name => patch.name = Some(product.name().to_string()),
                Field::Description => patch.description = Some(product.description().to_string()),
                Field::Category => patch.category = Some(product.category().to_string()),
                Field::BasePrice => {
                    let price = product.base_price();
                    patch.base_price =
                        Some((price.numerator().clone(), price.denominator().clone()));
                }
                Field::Discount => {
                    patch.discount = Some(product.discount().map(DiscountColumns::from_discount));
                }
                Field::Status => {
                    patch.status = Some((
                        product.status().as_str().to_string(),
                        product.archived_at(),
                    ));
                }
            }
        }

        Some(patch)
    }

    pub fn id(&self) -> ProductId {
        ProductId::from_uuid(self.product_id)
    }

    /// Write the patched columns onto `row`.
    pub fn apply_to(&self, row: &mut ProductRow) {
        if let Some(name) = &self.name {
            row.name = name.clone();
        }
        if let Some(description) = &self.description {
            row.description = description.clone();
        }
        if let Some(category) = &self.category {
            row.category = category.clone();
        }
        if let Some((numerator, denominator)) = &self.base_price {
            row.base_price_numerator = numerator.clone();
            row.base_price_denominator = denominator.clone();
        }
        if let Some(discount) = &self.discount {
            row.discount = discount.clone();
        }
        if let Some((status, archived_at)) = &self.status {
            row.status = status.clone();
            row.archived_at = *archived_at;
        }
        row.updated_at = self.updated_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::AggregateRoot;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn product() -> Product {
        let mut product = Product::create(
            ProductId::new(),
            "Widget",
            "A widget",
            "gadgets",
            Money::new(1999, 100).unwrap(),
            now(),
        )
        .unwrap();
        product.take_events();
        product
    }

    fn discount() -> Discount {
        Discount::percent(25, now() - Duration::hours(1), now() + Duration::days(1)).unwrap()
    }

    #[test]
    fn row_rehydrates_clean_aggregate() {
        let mut original = product();
        original.apply_discount(discount(), now()).unwrap();

        let row = ProductRow::from_aggregate(&original);
        assert_eq!(row.status, "active");
        assert_eq!(row.base_price_numerator, BigInt::from(1999));
        assert_eq!(row.base_price_denominator, BigInt::from(100));

        let restored = row.into_product().unwrap();
        assert_eq!(restored.product_id(), original.product_id());
        assert_eq!(restored.base_price(), original.base_price());
        assert_eq!(restored.discount(), original.discount());
        assert!(restored.pending_events().is_empty());
        assert!(!restored.changes().has_changes());
    }

    #[test]
    fn clean_product_has_no_patch() {
        assert!(ProductPatch::from_aggregate(&product()).is_none());
    }

    #[test]
    fn patch_only_carries_dirty_columns() {
        let mut p = product();
        let later = now() + Duration::minutes(3);
        p.update_details("Gizmo", "A widget", "gadgets", later).unwrap();

        let patch = ProductPatch::from_aggregate(&p).unwrap();
        assert_eq!(patch.name.as_deref(), Some("Gizmo"));
        assert!(patch.description.is_none());
        assert!(patch.category.is_none());
        assert!(patch.base_price.is_none());
        assert!(patch.discount.is_none());
        assert!(patch.status.is_none());
        assert_eq!(patch.updated_at, later);
    }

    #[test]
    fn removed_discount_clears_columns() {
        let mut p = product();
        p.apply_discount(discount(), now()).unwrap();
        let mut row = ProductRow::from_aggregate(&p);
        assert!(row.discount.is_some());

        let mut reloaded = row.clone().into_product().unwrap();
        reloaded.remove_discount(now()).unwrap();
        let patch = ProductPatch::from_aggregate(&reloaded).unwrap();
        assert_eq!(patch.discount, Some(None));

        patch.apply_to(&mut row);
        assert!(row.discount.is_none());
    }

    #[test]
    fn archive_patch_sets_status_and_archived_at() {
        let mut p = product();
        let at = now() + Duration::days(2);
        p.archive(at).unwrap();

        let patch = ProductPatch::from_aggregate(&p).unwrap();
        assert_eq!(patch.status, Some(("archived".to_string(), Some(at))));

        let mut row = ProductRow::from_aggregate(&product());
        patch.apply_to(&mut row);
        assert_eq!(row.archived_at, Some(at));
        assert_eq!(row.updated_at, at);
    }

    #[test]
    fn partial_discount_columns_are_rejected() {
        let err = DiscountColumns::from_nullable(Some(BigInt::from(25)), None, Some(now()), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
        assert_eq!(DiscountColumns::from_nullable(None, None, None, None).unwrap(), None);
    }

    #[test]
    fn corrupt_rows_fail_to_decode() {
        let mut row = ProductRow::from_aggregate(&product());
        row.status = "deleted".to_string();
        assert!(matches!(row.clone().into_product(), Err(StoreError::Decode(_))));

        row.status = "active".to_string();
        row.base_price_denominator = BigInt::zero();
        assert!(matches!(row.into_view(), Err(StoreError::Decode(_))));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Rename(String),
            Recategorize(String),
            Reprice(i64),
            Deactivate,
            Activate,
            Discount(i64),
            RemoveDiscount,
            Archive,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                "[A-Za-z]{1,12}".prop_map(Op::Rename),
                "[a-z]{1,8}".prop_map(Op::Recategorize),
                (0i64..100_000).prop_map(Op::Reprice),
                Just(Op::Deactivate),
                Just(Op::Activate),
                (1i64..=100).prop_map(Op::Discount),
                Just(Op::RemoveDiscount),
                Just(Op::Archive),
            ]
        }

        proptest! {
            /// Property: stored row + patch == full row of the mutated aggregate.
            #[test]
            fn patch_reproduces_full_row(ops in prop::collection::vec(op(), 0..8)) {
                let stored = ProductRow::from_aggregate(&product());
                let mut loaded = stored.clone().into_product().unwrap();

                for (step, op) in ops.into_iter().enumerate() {
                    let at = now() + Duration::minutes(step as i64 + 1);
                    // Rejected operations leave the aggregate untouched, so errors are ignored.
                    let _ = match op {
                        Op::Rename(name) => {
                            let (d, c) = (loaded.description().to_string(), loaded.category().to_string());
                            loaded.update_details(&name, &d, &c, at)
                        }
                        Op::Recategorize(category) => {
                            let (n, d) = (loaded.name().to_string(), loaded.description().to_string());
                            loaded.update_details(&n, &d, &category, at)
                        }
                        Op::Reprice(cents) => loaded.change_base_price(Money::new(cents, 100).unwrap(), at),
                        Op::Deactivate => loaded.deactivate(at),
                        Op::Activate => loaded.activate(at),
                        Op::Discount(pct) => loaded.apply_discount(
                            Discount::percent(pct, at - Duration::hours(1), at + Duration::days(1)).unwrap(),
                            at,
                        ),
                        Op::RemoveDiscount => loaded.remove_discount(at),
                        Op::Archive => loaded.archive(at),
                    };
                }

                let mut patched = stored;
                if let Some(patch) = ProductPatch::from_aggregate(&loaded) {
                    patch.apply_to(&mut patched);
                }
                prop_assert_eq!(patched, ProductRow::from_aggregate(&loaded));
            }
        }
    }
}
