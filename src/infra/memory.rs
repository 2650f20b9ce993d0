//! In-process catalog store.
//!
//! Used when no database is configured and throughout the tests. Every
//! committed product write is published to the [`ChangeFeed`] after the state
//! lock has been released.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::info;

use crate::application::events::{ChangeFeed, ChangeKind, ProductChange};
use crate::application::filters::FilterPredicate;
use crate::application::repos::{CatalogRepo, GroupCounts, GroupField, GroupValue, RepoError};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::buckets::PriceBucket;
use crate::domain::entities::{
    BrandId, BrandRecord, CategoryId, CategoryRecord, ProductDraft, ProductId, ProductRecord,
};
use crate::domain::error::DomainError;

const SOURCE: &str = "infra::memory";

#[derive(Default)]
struct CatalogState {
    products: BTreeMap<ProductId, ProductRecord>,
    categories: BTreeMap<CategoryId, CategoryRecord>,
    brands: BTreeMap<BrandId, BrandRecord>,
    last_product_id: ProductId,
    last_category_id: CategoryId,
    last_brand_id: BrandId,
}

impl CatalogState {
    fn check_references(&self, draft: &ProductDraft) -> Result<(), DomainError> {
        if !self.categories.contains_key(&draft.category_id) {
            return Err(DomainError::not_found("category"));
        }
        if let Some(brand_id) = draft.brand_id
            && !self.brands.contains_key(&brand_id)
        {
            return Err(DomainError::not_found("brand"));
        }
        Ok(())
    }

    fn adjust_count(&mut self, category_id: CategoryId, delta: i64) {
        if let Some(category) = self.categories.get_mut(&category_id) {
            category.product_count = category.product_count.saturating_add_signed(delta);
        }
    }
}

pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
    feed: Arc<ChangeFeed>,
}

impl InMemoryCatalog {
    pub fn new(feed: Arc<ChangeFeed>) -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            feed,
        }
    }

    pub fn change_feed(&self) -> &Arc<ChangeFeed> {
        &self.feed
    }

    pub fn create_category(&self, name: impl Into<String>) -> Result<CategoryRecord, DomainError> {
        let name = required_name(name.into(), "category")?;
        let mut state = rw_write(&self.state, SOURCE, "create_category");
        if state.categories.values().any(|category| category.name == name) {
            return Err(DomainError::conflict("category", name));
        }
        state.last_category_id += 1;
        let record = CategoryRecord {
            id: state.last_category_id,
            name,
            product_count: 0,
        };
        state.categories.insert(record.id, record.clone());
        Ok(record)
    }

    pub fn create_brand(&self, name: impl Into<String>) -> Result<BrandRecord, DomainError> {
        let name = required_name(name.into(), "brand")?;
        let mut state = rw_write(&self.state, SOURCE, "create_brand");
        if state.brands.values().any(|brand| brand.name == name) {
            return Err(DomainError::conflict("brand", name));
        }
        state.last_brand_id += 1;
        let record = BrandRecord {
            id: state.last_brand_id,
            name,
        };
        state.brands.insert(record.id, record.clone());
        Ok(record)
    }

    pub fn create_product(&self, draft: ProductDraft) -> Result<ProductRecord, DomainError> {
        self.create_product_at(draft, OffsetDateTime::now_utc())
    }

    /// Create a product with an explicit creation time.
    pub fn create_product_at(
        &self,
        draft: ProductDraft,
        created_at: OffsetDateTime,
    ) -> Result<ProductRecord, DomainError> {
        draft.validate()?;
        let record = {
            let mut state = rw_write(&self.state, SOURCE, "create_product");
            state.check_references(&draft)?;
            state.last_product_id += 1;
            let record = ProductRecord {
                id: state.last_product_id,
                name: draft.name,
                category_id: draft.category_id,
                brand_id: draft.brand_id,
                status: draft.status,
                price: draft.price,
                stock: draft.stock,
                created_at,
            };
            state.adjust_count(record.category_id, 1);
            state.products.insert(record.id, record.clone());
            record
        };
        self.feed
            .publish(ProductChange::new(record.id, ChangeKind::Created));
        Ok(record)
    }

    /// Replace every editable field of a product; `created_at` is kept.
    pub fn update_product(
        &self,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<ProductRecord, DomainError> {
        draft.validate()?;
        let record = {
            let mut state = rw_write(&self.state, SOURCE, "update_product");
            state.check_references(&draft)?;
            let previous_category = state
                .products
                .get(&id)
                .map(|product| product.category_id)
                .ok_or(DomainError::not_found("product"))?;
            if previous_category != draft.category_id {
                state.adjust_count(previous_category, -1);
                state.adjust_count(draft.category_id, 1);
            }
            let product = state
                .products
                .get_mut(&id)
                .ok_or(DomainError::not_found("product"))?;
            product.name = draft.name;
            product.category_id = draft.category_id;
            product.brand_id = draft.brand_id;
            product.status = draft.status;
            product.price = draft.price;
            product.stock = draft.stock;
            product.clone()
        };
        self.feed
            .publish(ProductChange::new(id, ChangeKind::Updated));
        Ok(record)
    }

    pub fn delete_product(&self, id: ProductId) -> Result<(), DomainError> {
        {
            let mut state = rw_write(&self.state, SOURCE, "delete_product");
            let removed = state
                .products
                .remove(&id)
                .ok_or(DomainError::not_found("product"))?;
            state.adjust_count(removed.category_id, -1);
        }
        self.feed
            .publish(ProductChange::new(id, ChangeKind::Deleted));
        Ok(())
    }

    /// Delete a category together with its products.
    pub fn delete_category(&self, id: CategoryId) -> Result<usize, DomainError> {
        let removed: Vec<ProductId> = {
            let mut state = rw_write(&self.state, SOURCE, "delete_category");
            state
                .categories
                .remove(&id)
                .ok_or(DomainError::not_found("category"))?;
            let doomed: Vec<ProductId> = state
                .products
                .values()
                .filter(|product| product.category_id == id)
                .map(|product| product.id)
                .collect();
            for product_id in &doomed {
                state.products.remove(product_id);
            }
            doomed
        };

        info!(
            category_id = id,
            products = removed.len(),
            "Category deleted with its products"
        );
        for product_id in &removed {
            self.feed
                .publish(ProductChange::new(*product_id, ChangeKind::Deleted));
        }
        Ok(removed.len())
    }

    /// Delete a brand; its products stay, without a brand.
    pub fn delete_brand(&self, id: BrandId) -> Result<usize, DomainError> {
        let detached: Vec<ProductId> = {
            let mut state = rw_write(&self.state, SOURCE, "delete_brand");
            state
                .brands
                .remove(&id)
                .ok_or(DomainError::not_found("brand"))?;
            state
                .products
                .values_mut()
                .filter(|product| product.brand_id == Some(id))
                .map(|product| {
                    product.brand_id = None;
                    product.id
                })
                .collect()
        };

        for product_id in &detached {
            self.feed
                .publish(ProductChange::new(*product_id, ChangeKind::Updated));
        }
        Ok(detached.len())
    }

    fn matching(&self, predicate: &FilterPredicate, op: &'static str) -> Vec<ProductRecord> {
        let state = rw_read(&self.state, SOURCE, op);
        let mut rows: Vec<ProductRecord> = state
            .products
            .values()
            .filter(|product| predicate.matches(product))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows
    }
}

fn required_name(name: String, entity: &'static str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{entity} name must not be blank")));
    }
    Ok(trimmed.to_string())
}

#[async_trait]
impl CatalogRepo for InMemoryCatalog {
    async fn query(&self, predicate: &FilterPredicate) -> Result<Vec<ProductRecord>, RepoError> {
        Ok(self.matching(predicate, "query"))
    }

    async fn count(&self, predicate: &FilterPredicate) -> Result<u64, RepoError> {
        let state = rw_read(&self.state, SOURCE, "count");
        Ok(state
            .products
            .values()
            .filter(|product| predicate.matches(product))
            .count() as u64)
    }

    async fn aggregate_count(
        &self,
        field: GroupField,
        predicate: &FilterPredicate,
    ) -> Result<GroupCounts, RepoError> {
        let state = rw_read(&self.state, SOURCE, "aggregate_count");
        let mut counts = GroupCounts::new();
        for product in state.products.values().filter(|p| predicate.matches(p)) {
            let group = match field {
                GroupField::Category => Some(GroupValue::Category(product.category_id)),
                GroupField::Status => Some(GroupValue::Status(product.status)),
                GroupField::PriceBucket => {
                    PriceBucket::classify(product.price).map(GroupValue::PriceBucket)
                }
            };
            if let Some(group) = group {
                *counts.entry(group).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "list_categories");
        let mut categories: Vec<CategoryRecord> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(categories)
    }

    async fn list_brands(&self) -> Result<Vec<BrandRecord>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "list_brands");
        let mut brands: Vec<BrandRecord> = state.brands.values().cloned().collect();
        brands.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(brands)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use time::Duration;

    use super::*;
    use crate::application::events::ProductChangeListener;
    use crate::domain::types::{Price, ProductStatus};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProductChange>>);

    impl ProductChangeListener for Recorder {
        fn on_product_changed(&self, change: &ProductChange) {
            self.0.lock().expect("recorder lock").push(*change);
        }
    }

    fn catalog() -> (InMemoryCatalog, Arc<Recorder>) {
        let feed = Arc::new(ChangeFeed::new());
        let recorder = Arc::new(Recorder::default());
        feed.subscribe(recorder.clone());
        (InMemoryCatalog::new(feed), recorder)
    }

    fn kinds(recorder: &Recorder) -> Vec<ChangeKind> {
        recorder
            .0
            .lock()
            .expect("recorder lock")
            .iter()
            .map(|change| change.kind)
            .collect()
    }

    #[tokio::test]
    async fn query_orders_newest_first() {
        let (catalog, _) = catalog();
        let category = catalog.create_category("Lamps").expect("category").id;
        let base = OffsetDateTime::UNIX_EPOCH;
        let old = catalog
            .create_product_at(ProductDraft::new("Old", category, Price::units(5)), base)
            .expect("product");
        let new = catalog
            .create_product_at(
                ProductDraft::new("New", category, Price::units(5)),
                base + Duration::days(1),
            )
            .expect("product");
        let tied = catalog
            .create_product_at(
                ProductDraft::new("Tied", category, Price::units(5)),
                base + Duration::days(1),
            )
            .expect("product");

        let ids: Vec<ProductId> = catalog
            .query(&FilterPredicate::unfiltered())
            .await
            .expect("query")
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![tied.id, new.id, old.id]);
    }

    #[tokio::test]
    async fn writes_publish_changes() {
        let (catalog, recorder) = catalog();
        let category = catalog.create_category("Lamps").expect("category").id;
        let product = catalog
            .create_product(ProductDraft::new("Lamp", category, Price::units(20)))
            .expect("product");
        catalog
            .update_product(
                product.id,
                ProductDraft::new("Lamp", category, Price::units(25))
                    .with_status(ProductStatus::Inactive),
            )
            .expect("update");
        catalog.delete_product(product.id).expect("delete");

        assert_eq!(
            kinds(&recorder),
            vec![ChangeKind::Created, ChangeKind::Updated, ChangeKind::Deleted]
        );
    }

    #[tokio::test]
    async fn rejected_writes_publish_nothing() {
        let (catalog, recorder) = catalog();
        let missing_category = catalog.create_product(ProductDraft::new("Lamp", 42, Price::ZERO));
        assert!(matches!(missing_category, Err(DomainError::NotFound { entity: "category" })));
        assert!(catalog.delete_product(7).is_err());
        assert!(kinds(&recorder).is_empty());
    }

    #[test]
    fn category_and_brand_names_are_unique() {
        let (catalog, _recorder) = catalog();
        catalog.create_category("Lamps").expect("category");
        catalog.create_brand("Acme").expect("brand");

        assert!(matches!(
            catalog.create_category(" Lamps "),
            Err(DomainError::Conflict { entity: "category", .. })
        ));
        assert!(matches!(
            catalog.create_brand("Acme"),
            Err(DomainError::Conflict { entity: "brand", .. })
        ));
    }

    #[tokio::test]
    async fn category_delete_cascades_to_products() {
        let (catalog, recorder) = catalog();
        let lamps = catalog.create_category("Lamps").expect("category").id;
        let rugs = catalog.create_category("Rugs").expect("category").id;
        for name in ["A", "B"] {
            catalog
                .create_product(ProductDraft::new(name, lamps, Price::units(1)))
                .expect("product");
        }
        catalog
            .create_product(ProductDraft::new("C", rugs, Price::units(1)))
            .expect("product");

        assert_eq!(catalog.delete_category(lamps).expect("delete"), 2);
        assert_eq!(catalog.count(&FilterPredicate::unfiltered()).await.expect("count"), 1);
        assert_eq!(kinds(&recorder).iter().filter(|k| **k == ChangeKind::Deleted).count(), 2);
    }

    #[tokio::test]
    async fn brand_delete_detaches_products() {
        let (catalog, recorder) = catalog();
        let lamps = catalog.create_category("Lamps").expect("category").id;
        let brand = catalog.create_brand("Lumen").expect("brand").id;
        let product = catalog
            .create_product(ProductDraft::new("A", lamps, Price::units(1)).with_brand(brand))
            .expect("product");

        assert_eq!(catalog.delete_brand(brand).expect("delete"), 1);
        let rows = catalog.query(&FilterPredicate::unfiltered()).await.expect("query");
        assert_eq!(rows[0].id, product.id);
        assert_eq!(rows[0].brand_id, None);
        assert_eq!(kinds(&recorder).last(), Some(&ChangeKind::Updated));
    }

    #[tokio::test]
    async fn product_count_tracks_category_moves() {
        let (catalog, _) = catalog();
        let lamps = catalog.create_category("Lamps").expect("category").id;
        let rugs = catalog.create_category("Rugs").expect("category").id;
        let product = catalog
            .create_product(ProductDraft::new("A", lamps, Price::units(1)))
            .expect("product");
        catalog
            .update_product(product.id, ProductDraft::new("A", rugs, Price::units(1)))
            .expect("update");

        let counts: Vec<(String, u64)> = catalog
            .list_categories()
            .await
            .expect("categories")
            .into_iter()
            .map(|c| (c.name, c.product_count))
            .collect();
        assert_eq!(counts, vec![("Lamps".to_string(), 0), ("Rugs".to_string(), 1)]);
    }

    #[tokio::test]
    async fn prices_above_the_last_bucket_are_not_bucketed() {
        let (catalog, _) = catalog();
        let lamps = catalog.create_category("Lamps").expect("category").id;
        catalog
            .create_product(ProductDraft::new("Chandelier", lamps, Price::units(1500)))
            .expect("product");

        let buckets = catalog
            .aggregate_count(GroupField::PriceBucket, &FilterPredicate::unfiltered())
            .await
            .expect("aggregate");
        assert!(buckets.is_empty());
    }
}
