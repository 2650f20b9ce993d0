use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::debugging::DebuggingRecorder;
use vetrina::application::catalog::{CatalogService, ListingRequest};
use vetrina::application::events::ChangeFeed;
use vetrina::application::filters::Endpoint;
use vetrina::cache::{
    CacheConfig, CacheInvalidator, CacheStore, EvictOutcome, MemoryStore, ResponseCache,
    ResponseKey, StoredPayload,
};
use vetrina::domain::entities::ProductDraft;
use vetrina::domain::types::Price;
use vetrina::infra::memory::InMemoryCatalog;
use vetrina::presentation::views::AskamaRenderer;

struct NoPrefixStore(MemoryStore);

#[async_trait]
impl CacheStore for NoPrefixStore {
    async fn get(&self, key: &ResponseKey) -> Option<StoredPayload> {
        self.0.get(key).await
    }

    async fn set(&self, key: ResponseKey, stored: StoredPayload, ttl: Duration) {
        self.0.set(key, stored, ttl).await;
    }

    async fn evict_prefix(&self, _prefix: &str) -> EvictOutcome {
        EvictOutcome::Unsupported
    }

    async fn clear(&self) {
        self.0.clear().await;
    }
}

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let feed = Arc::new(ChangeFeed::new());
    let catalog = Arc::new(InMemoryCatalog::new(feed.clone()));
    let category = catalog.create_category("Garden").expect("category").id;

    // Capacity of one forces an LRU eviction on the second distinct key.
    let config = CacheConfig {
        capacity: 1,
        ..CacheConfig::default()
    };
    let cache = Arc::new(ResponseCache::new(
        Arc::new(MemoryStore::new(&config)),
        config,
    ));
    let invalidator = Arc::new(CacheInvalidator::new(cache.clone()));
    feed.subscribe(invalidator.clone());
    let service = CatalogService::new(catalog.clone(), Arc::new(AskamaRenderer::new()), cache);

    catalog
        .create_product(ProductDraft::new("Hose", category, Price::units(25)))
        .expect("product");
    // Pending invalidation: bypass.
    service
        .listing(&ListingRequest::from_query(Endpoint::Live, ""))
        .await
        .expect("listing");
    invalidator.run_pass().await.expect("queued change");

    for query in ["", "", "page=2"] {
        service
            .listing(&ListingRequest::from_query(Endpoint::Live, query))
            .await
            .expect("listing");
    }

    // Prefix eviction on a store that supports it, then the clear fallback.
    catalog
        .create_product(ProductDraft::new("Rake", category, Price::units(18)))
        .expect("product");
    invalidator.flush().await;

    let opaque_config = CacheConfig::default();
    let opaque = Arc::new(ResponseCache::new(
        Arc::new(NoPrefixStore(MemoryStore::new(&opaque_config))),
        opaque_config,
    ));
    opaque.evict_listings().await;

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "vetrina_cache_hit_total",
        "vetrina_cache_miss_total",
        "vetrina_cache_evict_total",
        "vetrina_cache_clear_fallback_total",
        "vetrina_invalidation_events_total",
        "vetrina_invalidation_queue_len",
        "vetrina_invalidation_pass_ms",
        "vetrina_facets_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
