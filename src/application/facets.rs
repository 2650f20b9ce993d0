//! Facet aggregation.
//!
//! Category and status breakdowns cover the whole catalog. Price-bucket counts
//! follow the request's category, brand and status filters but ignore its
//! price constraint, so every bucket shows what selecting it would return.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::application::filters::FilterPredicate;
use crate::application::repos::{CatalogRepo, GroupCounts, GroupField, GroupValue, RepoError};
use crate::domain::buckets::PriceBucket;
use crate::domain::entities::CategoryId;
use crate::domain::types::ProductStatus;

const METRIC_FACETS_MS: &str = "vetrina_facets_ms";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryFacet {
    pub id: CategoryId,
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusFacet {
    pub status: ProductStatus,
    pub label: &'static str,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketFacet {
    pub bucket: PriceBucket,
    pub label: &'static str,
    pub count: u64,
}

/// Counts per facet value. Every known category, both statuses and all six
/// buckets are present, zero counts included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct FacetCounts {
    /// Ordered by count descending, then name.
    pub categories: Vec<CategoryFacet>,
    /// In [`ProductStatus::ALL`] order.
    pub statuses: Vec<StatusFacet>,
    /// In [`PriceBucket::ALL`] order.
    pub price_buckets: Vec<BucketFacet>,
}

impl FacetCounts {
    pub fn category_count(&self, id: CategoryId) -> u64 {
        self.categories
            .iter()
            .find(|facet| facet.id == id)
            .map_or(0, |facet| facet.count)
    }

    pub fn status_count(&self, status: ProductStatus) -> u64 {
        self.statuses
            .iter()
            .find(|facet| facet.status == status)
            .map_or(0, |facet| facet.count)
    }

    pub fn bucket_count(&self, bucket: PriceBucket) -> u64 {
        self.price_buckets
            .iter()
            .find(|facet| facet.bucket == bucket)
            .map_or(0, |facet| facet.count)
    }

    /// Sum over the status facet; equals the unfiltered product count.
    pub fn status_total(&self) -> u64 {
        self.statuses.iter().map(|facet| facet.count).sum()
    }
}

#[derive(Clone)]
pub struct FacetAggregator {
    repo: Arc<dyn CatalogRepo>,
}

impl FacetAggregator {
    pub fn new(repo: Arc<dyn CatalogRepo>) -> Self {
        Self { repo }
    }

    /// Compute all facets for `predicate`. The four storage reads are issued
    /// concurrently; any failure fails the whole aggregation.
    #[instrument(skip_all)]
    pub async fn aggregate(&self, predicate: &FilterPredicate) -> Result<FacetCounts, RepoError> {
        let started_at = Instant::now();
        let unfiltered = FilterPredicate::unfiltered();
        let bucket_scope = predicate.without_price();

        let (category_counts, categories, status_counts, bucket_counts) = tokio::try_join!(
            self.repo.aggregate_count(GroupField::Category, &unfiltered),
            self.repo.list_categories(),
            self.repo.aggregate_count(GroupField::Status, &unfiltered),
            self.repo.aggregate_count(GroupField::PriceBucket, &bucket_scope),
        )?;

        let mut category_facets: Vec<CategoryFacet> = categories
            .into_iter()
            .map(|category| CategoryFacet {
                count: category_counts
                    .get(&GroupValue::Category(category.id))
                    .copied()
                    .unwrap_or(0),
                id: category.id,
                name: category.name,
            })
            .collect();
        category_facets.sort_by(|a, b| {
            (Reverse(a.count), &a.name, a.id).cmp(&(Reverse(b.count), &b.name, b.id))
        });

        let facets = FacetCounts {
            categories: category_facets,
            statuses: status_facets(&status_counts),
            price_buckets: bucket_facets(&bucket_counts),
        };

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_FACETS_MS).record(elapsed_ms);
        debug!(
            categories = facets.categories.len(),
            products = facets.status_total(),
            elapsed_ms,
            "Facets aggregated"
        );

        Ok(facets)
    }
}

fn status_facets(counts: &GroupCounts) -> Vec<StatusFacet> {
    ProductStatus::ALL
        .into_iter()
        .map(|status| StatusFacet {
            status,
            label: status.label(),
            count: counts.get(&GroupValue::Status(status)).copied().unwrap_or(0),
        })
        .collect()
}

fn bucket_facets(counts: &GroupCounts) -> Vec<BucketFacet> {
    PriceBucket::ALL
        .into_iter()
        .map(|bucket| BucketFacet {
            bucket,
            label: bucket.label(),
            count: counts
                .get(&GroupValue::PriceBucket(bucket))
                .copied()
                .unwrap_or(0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::ChangeFeed;
    use crate::application::filters::{Endpoint, PredicateBuilder, RawParams};
    use crate::domain::entities::ProductDraft;
    use crate::domain::types::Price;
    use crate::infra::memory::InMemoryCatalog;

    async fn seeded() -> (Arc<InMemoryCatalog>, CategoryId, CategoryId) {
        let catalog = Arc::new(InMemoryCatalog::new(Arc::new(ChangeFeed::new())));
        let lamps = catalog.create_category("Lamps").expect("category").id;
        let chairs = catalog.create_category("Chairs").expect("category").id;
        catalog.create_category("Rugs").expect("category");

        for (name, category, cents, status) in [
            ("Desk lamp", lamps, 1_000, ProductStatus::Active),
            ("Floor lamp", lamps, 6_000, ProductStatus::Active),
            ("Armchair", chairs, 90_000, ProductStatus::Inactive),
        ] {
            let draft = ProductDraft::new(name, category, Price::from_cents(cents).expect("price"))
                .with_status(status);
            catalog.create_product(draft).expect("product");
        }
        (catalog, lamps, chairs)
    }

    fn predicate(endpoint: Endpoint, query: &str) -> FilterPredicate {
        PredicateBuilder::for_endpoint(endpoint).build(&RawParams::from_query(query))
    }

    #[tokio::test]
    async fn category_and_status_facets_ignore_filters() {
        let (catalog, lamps, chairs) = seeded().await;
        let aggregator = FacetAggregator::new(catalog);

        let facets = aggregator
            .aggregate(&predicate(Endpoint::Live, &format!("category={chairs}&status=inactive")))
            .await
            .expect("facets");

        assert_eq!(facets.category_count(lamps), 2);
        assert_eq!(facets.category_count(chairs), 1);
        assert_eq!(facets.status_count(ProductStatus::Active), 2);
        assert_eq!(facets.status_count(ProductStatus::Inactive), 1);
        assert_eq!(facets.status_total(), 3);
    }

    #[tokio::test]
    async fn category_facets_sort_by_count_then_name_with_zero_counts() {
        let (catalog, _, _) = seeded().await;
        let facets = FacetAggregator::new(catalog)
            .aggregate(&FilterPredicate::unfiltered())
            .await
            .expect("facets");

        let names: Vec<&str> = facets.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Lamps", "Chairs", "Rugs"]);
        assert_eq!(facets.categories[2].count, 0);
    }

    #[tokio::test]
    async fn bucket_facets_follow_filters_but_not_price() {
        let (catalog, lamps, _) = seeded().await;
        let aggregator = FacetAggregator::new(catalog);

        let facets = aggregator
            .aggregate(&predicate(
                Endpoint::Live,
                &format!("category={lamps}&price_bucket=0_50"),
            ))
            .await
            .expect("facets");

        assert_eq!(facets.bucket_count(PriceBucket::Under50), 1);
        assert_eq!(facets.bucket_count(PriceBucket::From50To100), 1);
        assert_eq!(facets.bucket_count(PriceBucket::From800To1000), 0);
        assert_eq!(facets.price_buckets.len(), 6);
    }

    #[tokio::test]
    async fn empty_catalog_yields_zero_counts() {
        let catalog = Arc::new(InMemoryCatalog::new(Arc::new(ChangeFeed::new())));
        let facets = FacetAggregator::new(catalog)
            .aggregate(&FilterPredicate::unfiltered())
            .await
            .expect("facets");

        assert!(facets.categories.is_empty());
        assert_eq!(facets.statuses.len(), 2);
        assert!(facets.statuses.iter().all(|facet| facet.count == 0));
        assert_eq!(facets.price_buckets.len(), 6);
        assert!(facets.price_buckets.iter().all(|facet| facet.count == 0));
    }
}
