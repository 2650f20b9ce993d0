use std::sync::Arc;

use vetrina::application::events::ChangeFeed;
use vetrina::application::facets::FacetAggregator;
use vetrina::application::filters::{Endpoint, FilterPredicate, PredicateBuilder, RawParams};
use vetrina::application::repos::CatalogRepo;
use vetrina::domain::buckets::PriceBucket;
use vetrina::domain::entities::{CategoryId, ProductDraft};
use vetrina::domain::types::{Price, ProductStatus};
use vetrina::infra::memory::InMemoryCatalog;

fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::new(Arc::new(ChangeFeed::new())))
}

fn predicate(endpoint: Endpoint, query: &str) -> FilterPredicate {
    PredicateBuilder::for_endpoint(endpoint).build(&RawParams::from_query(query))
}

async fn names(repo: &InMemoryCatalog, endpoint: Endpoint, query: &str) -> Vec<String> {
    repo.query(&predicate(endpoint, query))
        .await
        .expect("query")
        .into_iter()
        .map(|product| product.name)
        .collect()
}

fn seed_three(repo: &InMemoryCatalog) -> CategoryId {
    let category = repo.create_category("Gadgets").expect("category").id;
    for (name, units) in [("cheap", 10), ("mid", 60), ("premium", 900)] {
        repo.create_product(ProductDraft::new(name, category, Price::units(units)))
            .expect("product");
    }
    category
}

#[tokio::test]
async fn bucket_and_range_paths_select_the_expected_products() {
    let repo = catalog();
    seed_three(&repo);

    assert_eq!(
        names(&repo, Endpoint::Faceted, "price_bucket=0_50").await,
        ["cheap"]
    );
    assert_eq!(
        names(&repo, Endpoint::Faceted, "price_bucket=800_1000").await,
        ["premium"]
    );
    assert_eq!(
        names(&repo, Endpoint::Manual, "min_price=50&max_price=100").await,
        ["mid"]
    );
    assert_eq!(
        names(&repo, Endpoint::Live, "min_price=50&max_price=100").await,
        ["mid"]
    );
}

#[tokio::test]
async fn bucket_boundaries_follow_the_last_bucket_rule() {
    let repo = catalog();
    let category = repo.create_category("Edges").expect("category").id;
    for cents in [4_999, 5_000, 79_999, 80_000, 100_000] {
        let price = Price::from_cents(cents).expect("price");
        repo.create_product(ProductDraft::new(price.to_string(), category, price))
            .expect("product");
    }

    assert_eq!(
        names(&repo, Endpoint::Faceted, "price_bucket=0_50").await,
        ["49.99"]
    );
    assert_eq!(
        names(&repo, Endpoint::Faceted, "price_bucket=50_100").await,
        ["50.00"]
    );
    assert_eq!(
        names(&repo, Endpoint::Faceted, "price_bucket=500_800").await,
        ["799.99"]
    );
    assert_eq!(
        names(&repo, Endpoint::Faceted, "price_bucket=800_1000").await,
        ["1000.00", "800.00"]
    );
    assert_eq!(
        PriceBucket::classify(Price::units(1000)),
        Some(PriceBucket::From800To1000)
    );
}

#[tokio::test]
async fn count_matches_query_length_for_every_shape_of_predicate() {
    let repo = catalog();
    let category = seed_three(&repo);
    let other = repo.create_category("Other").expect("category").id;
    let brand = repo.create_brand("Acme").expect("brand").id;
    repo.create_product(
        ProductDraft::new("branded", other, Price::units(120))
            .with_brand(brand)
            .with_status(ProductStatus::Inactive),
    )
    .expect("product");

    let queries = [
        (Endpoint::Manual, String::new()),
        (Endpoint::Manual, format!("category={category}")),
        (Endpoint::Manual, "min_price=abc&status=bogus".to_string()),
        (Endpoint::Faceted, format!("category={category}&category={other}")),
        (Endpoint::Faceted, "status=inactive&price_bucket=100_200".to_string()),
        (Endpoint::Live, format!("brand={brand}&status=active")),
        (Endpoint::Live, "min_price=100".to_string()),
    ];

    for (endpoint, query) in queries {
        let pred = predicate(endpoint, &query);
        let rows = repo.query(&pred).await.expect("query");
        let count = repo.count(&pred).await.expect("count");
        assert_eq!(count, rows.len() as u64, "{endpoint:?} {query}");
    }
}

#[tokio::test]
async fn status_facets_sum_to_the_unfiltered_total() {
    let repo = catalog();
    let category = seed_three(&repo);
    repo.create_product(
        ProductDraft::new("retired", category, Price::units(30))
            .with_status(ProductStatus::Inactive),
    )
    .expect("product");

    let aggregator = FacetAggregator::new(repo.clone());
    let filtered = predicate(Endpoint::Live, "status=inactive&price_bucket=0_50");
    let facets = aggregator.aggregate(&filtered).await.expect("facets");

    assert_eq!(facets.status_total(), 4);
    assert_eq!(facets.status_count(ProductStatus::Active), 3);
    assert_eq!(facets.category_count(category), 4);
    assert_eq!(facets.bucket_count(PriceBucket::Under50), 1);
}

#[tokio::test]
async fn empty_catalog_yields_empty_results_and_zero_facets() {
    let repo = catalog();
    let pred = FilterPredicate::unfiltered();

    assert!(repo.query(&pred).await.expect("query").is_empty());
    assert_eq!(repo.count(&pred).await.expect("count"), 0);

    let facets = FacetAggregator::new(repo.clone())
        .aggregate(&pred)
        .await
        .expect("facets");
    assert!(facets.categories.is_empty());
    assert_eq!(facets.status_total(), 0);
    for bucket in PriceBucket::ALL {
        assert_eq!(facets.bucket_count(bucket), 0);
    }
}
