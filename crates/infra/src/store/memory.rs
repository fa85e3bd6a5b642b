use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::{debug, instrument, trace};
use uuid::Uuid;

use catalog_core::{DomainError, ProductId};
use catalog_events::OutboxEvent;
use catalog_products::{Product, ProductStatus};

use crate::commit_plan::{CommitPlan, Committer, Mutation};
use crate::error::{CatalogResult, StoreError};
use crate::models::{OutboxRow, ProductPatch, ProductRow, ProductView};
use crate::repository::{OutboxRepository, ProductReadModel, ProductRepository, ViewPage};

const DRIVER: &str = "memory";

/// The only mutation type [`InMemoryCatalogStore`] accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryMutation {
    InsertProduct(ProductRow),
    UpdateProduct(ProductPatch),
    InsertOutbox(OutboxRow),
}

/// Inverse of one applied mutation.
#[derive(Debug)]
enum Undo {
    RemoveProduct(Uuid),
    RestoreProduct(ProductRow),
    PopOutbox(Uuid),
}

#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<Uuid, ProductRow>,
    outbox: Vec<OutboxRow>,
    outbox_ids: HashSet<Uuid>,
}

impl Tables {
    fn apply(&mut self, mutation: MemoryMutation) -> Result<Undo, StoreError> {
        match mutation {
            MemoryMutation::InsertProduct(row) => {
                if self.products.contains_key(&row.product_id) {
                    return Err(StoreError::Conflict(format!(
                        "product {} already exists",
                        row.product_id
                    )));
                }
                let id = row.product_id;
                self.products.insert(id, row);
                Ok(Undo::RemoveProduct(id))
            }
            MemoryMutation::UpdateProduct(patch) => {
                let row = self.products.get_mut(&patch.product_id).ok_or_else(|| {
                    StoreError::Conflict(format!("product {} does not exist", patch.product_id))
                })?;
                let before = row.clone();
                patch.apply_to(row);
                Ok(Undo::RestoreProduct(before))
            }
            MemoryMutation::InsertOutbox(row) => {
                if !self.outbox_ids.insert(row.event_id) {
                    return Err(StoreError::Conflict(format!(
                        "outbox event {} already exists",
                        row.event_id
                    )));
                }
                let id = row.event_id;
                self.outbox.push(row);
                Ok(Undo::PopOutbox(id))
            }
        }
    }

    /// Undo entries must be reverted newest first.
    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::RemoveProduct(id) => {
                self.products.remove(&id);
            }
            Undo::RestoreProduct(row) => {
                self.products.insert(row.product_id, row);
            }
            Undo::PopOutbox(id) => {
                self.outbox.pop();
                self.outbox_ids.remove(&id);
            }
        }
    }
}

/// In-memory catalog store: both tables behind one lock.
///
/// Intended for tests/dev. A commit type-checks the whole plan first, then applies it
/// under the write lock while keeping an undo log; the first failing mutation reverts
/// everything applied before it.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    tables: RwLock<Tables>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Storage("lock poisoned".to_string())
    }

    fn read_row(&self, id: ProductId) -> Result<Option<ProductRow>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables.products.get(id.as_uuid()).cloned())
    }

    /// Apply all mutations or none. Returns how many were applied.
    fn commit(&self, plan: CommitPlan) -> Result<usize, StoreError> {
        let mutations = plan
            .into_mutations()
            .into_iter()
            .enumerate()
            .map(|(index, mutation)| mutation.into_driver::<MemoryMutation>(DRIVER, index))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;
        let mut undo_log = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            match tables.apply(mutation) {
                Ok(undo) => undo_log.push(undo),
                Err(err) => {
                    debug!(reverted = undo_log.len(), "commit plan failed; rolling back");
                    for undo in undo_log.into_iter().rev() {
                        tables.revert(undo);
                    }
                    return Err(err);
                }
            }
        }
        Ok(undo_log.len())
    }

    /// Number of stored products, in any status.
    pub fn product_count(&self) -> usize {
        self.tables.read().map(|t| t.products.len()).unwrap_or(0)
    }

    /// Outbox records in insertion order.
    pub fn outbox_events(&self) -> Result<Vec<OutboxEvent>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        tables.outbox.iter().cloned().map(OutboxRow::into_event).collect()
    }
}

#[async_trait]
impl Committer for InMemoryCatalogStore {
    #[instrument(skip(self, plan), fields(driver = DRIVER, mutations = plan.len()), err)]
    async fn apply(&self, plan: CommitPlan) -> Result<(), StoreError> {
        if plan.is_empty() {
            trace!("empty commit plan; nothing to apply");
            return Ok(());
        }

        let applied = self.commit(plan)?;
        debug!(applied, "commit plan applied");
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for InMemoryCatalogStore {
    async fn find_by_id(&self, id: ProductId) -> CatalogResult<Product> {
        let row = self.read_row(id)?.ok_or(DomainError::NotFound)?;
        Ok(row.into_product()?)
    }

    fn insert_mutation(&self, product: &Product) -> Mutation {
        Mutation::new(MemoryMutation::InsertProduct(ProductRow::from_aggregate(product)))
    }

    fn update_mutation(&self, product: &Product) -> Option<Mutation> {
        ProductPatch::from_aggregate(product)
            .map(|patch| Mutation::new(MemoryMutation::UpdateProduct(patch)))
    }
}

impl OutboxRepository for InMemoryCatalogStore {
    fn insert_mutation(&self, event: &OutboxEvent) -> Mutation {
        Mutation::new(MemoryMutation::InsertOutbox(OutboxRow::from(event)))
    }
}

#[async_trait]
impl ProductReadModel for InMemoryCatalogStore {
    async fn get_by_id(&self, id: ProductId) -> CatalogResult<ProductView> {
        let row = self.read_row(id)?.ok_or(DomainError::NotFound)?;
        Ok(row.into_view()?)
    }

    async fn list_active(
        &self,
        page_size: u32,
        after: Option<ProductId>,
        category: Option<&str>,
    ) -> CatalogResult<ViewPage> {
        let page_size = page_size as usize;
        let lower = match after {
            Some(id) => Bound::Excluded(*id.as_uuid()),
            None => Bound::Unbounded,
        };

        let rows: Vec<ProductRow> = {
            let tables = self.tables.read().map_err(|_| Self::poisoned())?;
            tables
                .products
                .range((lower, Bound::Unbounded))
                .map(|(_, row)| row)
                .filter(|row| row.status == ProductStatus::Active.as_str())
                .filter(|row| category.is_none_or(|c| row.category == c))
                .take(page_size + 1)
                .cloned()
                .collect()
        };

        let views = rows
            .into_iter()
            .map(ProductRow::into_view)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ViewPage::from_overfetch(views, page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::AggregateRoot;
    use catalog_products::Money;
    use chrono::Utc;

    fn product(name: &str, category: &str) -> Product {
        let mut p = Product::create(
            ProductId::new(),
            name,
            "",
            category,
            Money::new(500, 100).unwrap(),
            Utc::now(),
        )
        .unwrap();
        p.take_events();
        p
    }

    fn insert(store: &InMemoryCatalogStore, product: &Product) -> CommitPlan {
        let mut plan = CommitPlan::new();
        plan.add(ProductRepository::insert_mutation(store, product));
        plan
    }

    #[tokio::test]
    async fn empty_plan_is_a_no_op() {
        let store = InMemoryCatalogStore::new();
        store.apply(CommitPlan::new()).await.unwrap();
        assert_eq!(store.product_count(), 0);
    }

    #[tokio::test]
    async fn insert_then_find() {
        let store = InMemoryCatalogStore::new();
        let p = product("Widget", "gadgets");
        store.apply(insert(&store, &p)).await.unwrap();

        let loaded = store.find_by_id(p.product_id()).await.unwrap();
        assert_eq!(loaded.name(), "Widget");
        assert!(!loaded.changes().has_changes());
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let store = InMemoryCatalogStore::new();
        let err = store.find_by_id(ProductId::new()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.get_by_id(ProductId::new()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn foreign_mutation_rejects_whole_plan() {
        let store = InMemoryCatalogStore::new();
        let p = product("Widget", "gadgets");
        let mut plan = insert(&store, &p);
        plan.add(Mutation::new("DELETE FROM products".to_string()));

        match store.apply(plan).await {
            Err(StoreError::MutationTypeMismatch { driver, index, .. }) => {
                assert_eq!(driver, "memory");
                assert_eq!(index, 1);
            }
            other => panic!("Expected MutationTypeMismatch, got {other:?}"),
        }
        assert_eq!(store.product_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_insert_rolls_back_earlier_mutations() {
        let store = InMemoryCatalogStore::new();
        let existing = product("Existing", "gadgets");
        store.apply(insert(&store, &existing)).await.unwrap();

        let fresh = product("Fresh", "gadgets");
        let mut plan = insert(&store, &fresh);
        plan.add(ProductRepository::insert_mutation(&store, &existing));

        assert!(matches!(store.apply(plan).await, Err(StoreError::Conflict(_))));
        assert_eq!(store.product_count(), 1);
        assert!(store.find_by_id(fresh.product_id()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn failed_plan_reverts_updates_and_outbox_rows() {
        let store = InMemoryCatalogStore::new();
        let existing = product("Existing", "gadgets");
        store.apply(insert(&store, &existing)).await.unwrap();

        let mut changed = store.find_by_id(existing.product_id()).await.unwrap();
        changed.deactivate(Utc::now()).unwrap();
        let events = changed.take_events();

        let mut plan = CommitPlan::new();
        plan.add(store.update_mutation(&changed));
        for event in &events {
            let record = crate::outbox::enrich(existing.product_id().aggregate_id(), event);
            plan.add(OutboxRepository::insert_mutation(&store, &record));
        }
        plan.add(ProductRepository::insert_mutation(&store, &existing));

        assert!(matches!(store.apply(plan).await, Err(StoreError::Conflict(_))));
        let reloaded = store.find_by_id(existing.product_id()).await.unwrap();
        assert_eq!(reloaded.status(), ProductStatus::Active);
        assert!(store.outbox_events().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_outbox_id_conflicts() {
        let store = InMemoryCatalogStore::new();
        let mut p = product("Widget", "gadgets");
        p.deactivate(Utc::now()).unwrap();
        let record = crate::outbox::enrich(p.product_id().aggregate_id(), &p.take_events()[0]);

        let mut first = CommitPlan::new();
        first.add(OutboxRepository::insert_mutation(&store, &record));
        store.apply(first).await.unwrap();

        let mut again = CommitPlan::new();
        again.add(OutboxRepository::insert_mutation(&store, &record));
        assert!(matches!(store.apply(again).await, Err(StoreError::Conflict(_))));
        assert_eq!(store.outbox_events().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_active_pages_through_every_row() {
        let store = InMemoryCatalogStore::new();
        let mut expected = Vec::new();
        for n in 0..5 {
            let p = product(&format!("Gadget {n}"), "gadgets");
            store.apply(insert(&store, &p)).await.unwrap();
            expected.push(p.product_id());
        }
        expected.sort();

        let mut seen = Vec::new();
        let mut sizes = Vec::new();
        let mut after = None;
        loop {
            let page = store.list_active(2, after, Some("gadgets")).await.unwrap();
            sizes.push(page.views.len());
            seen.extend(page.views.iter().map(|v| v.id));
            match page.next {
                Some(next) => after = Some(next),
                None => break,
            }
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn update_of_missing_row_conflicts() {
        let store = InMemoryCatalogStore::new();
        let mut p = product("Widget", "gadgets");
        p.deactivate(Utc::now()).unwrap();

        let mut plan = CommitPlan::new();
        plan.add(store.update_mutation(&p));
        assert!(matches!(store.apply(plan).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn list_skips_inactive_and_other_categories() {
        let store = InMemoryCatalogStore::new();
        let mut inactive = product("Off", "gadgets");
        inactive.deactivate(Utc::now()).unwrap();
        let books = product("Book", "books");
        let gadget = product("On", "gadgets");

        for p in [&inactive, &books, &gadget] {
            store.apply(insert(&store, p)).await.unwrap();
        }

        let page = store.list_active(10, None, Some("gadgets")).await.unwrap();
        assert_eq!(page.views.len(), 1);
        assert_eq!(page.views[0].id, gadget.product_id());
        assert!(page.next.is_none());

        let page = store.list_active(10, None, None).await.unwrap();
        assert_eq!(page.views.len(), 2);
    }
}
