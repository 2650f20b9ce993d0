//! Read-through response cache for listing payloads.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tracing::{debug, info, warn};

use super::config::{CacheConfig, LISTING_NAMESPACE};
use super::events::Epoch;
use super::keys::ResponseKey;
use super::store::{CachePayload, CacheStore, EvictOutcome, StoredPayload};

const METRIC_CACHE_HIT_TOTAL: &str = "vetrina_cache_hit_total";
const METRIC_CACHE_MISS_TOTAL: &str = "vetrina_cache_miss_total";
const METRIC_CACHE_CLEAR_FALLBACK_TOTAL: &str = "vetrina_cache_clear_fallback_total";

/// How a listing eviction pass was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    Prefix { evicted: usize },
    /// The store could not evict by prefix and was cleared entirely.
    Cleared,
}

/// Listing payload cache in front of a [`CacheStore`].
///
/// Two generations are tracked: `raised` moves when a product change is
/// observed, `settled` when an eviction pass covering that change completed.
/// While they differ, reads bypass the store and nothing is written back, so a
/// repeat request after a write never sees a payload rendered before it.
/// Stored entries carry the generation they were computed under; an entry
/// older than the current generation is a miss even if its write landed after
/// the eviction pass.
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    raised: AtomicU64,
    settled: AtomicU64,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            raised: AtomicU64::new(0),
            settled: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Record that cached listings are stale; returns the new generation.
    pub fn mark_stale(&self) -> Epoch {
        self.raised.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record that every change up to `epoch` has been evicted.
    pub fn mark_settled(&self, epoch: Epoch) {
        self.settled.fetch_max(epoch, Ordering::SeqCst);
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst) >= self.raised.load(Ordering::SeqCst)
    }

    /// Return the cached payload for `key`, or run `compute` and store its
    /// result for the configured TTL.
    ///
    /// Concurrent misses on one key may both compute; the last write wins. A
    /// payload whose computation overlapped a product change is returned to
    /// its caller but not stored, and one whose write raced a change is never
    /// served afterwards.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: ResponseKey,
        compute: F,
    ) -> Result<Arc<CachePayload>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachePayload, E>>,
    {
        if !self.config.enabled {
            return compute().await.map(Arc::new);
        }

        let generation = self.raised.load(Ordering::SeqCst);
        let settled = self.settled.load(Ordering::SeqCst) >= generation;

        if settled {
            match self.store.get(&key).await {
                Some(stored) if stored.generation >= generation => {
                    counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                    debug!(key = %key, "Response cache hit");
                    return Ok(stored.payload);
                }
                Some(stored) => {
                    counter!(METRIC_CACHE_MISS_TOTAL, "reason" => "superseded").increment(1);
                    debug!(
                        key = %key,
                        generation,
                        stored_generation = stored.generation,
                        "Response cache entry predates the last change"
                    );
                }
                None => {
                    counter!(METRIC_CACHE_MISS_TOTAL, "reason" => "absent").increment(1);
                    debug!(key = %key, "Response cache miss");
                }
            }
        } else {
            counter!(METRIC_CACHE_MISS_TOTAL, "reason" => "pending_invalidation").increment(1);
            debug!(key = %key, generation, "Response cache bypassed pending invalidation");
        }

        let payload = Arc::new(compute().await?);

        if settled && self.raised.load(Ordering::SeqCst) == generation {
            let stored = StoredPayload::new(generation, Arc::clone(&payload));
            self.store.set(key, stored, self.config.ttl()).await;
        } else {
            debug!(key = %key, generation, "Skipped storing payload computed across a change");
        }

        Ok(payload)
    }

    /// Evict every listing payload, clearing the whole store when prefix
    /// eviction is unsupported.
    pub async fn evict_listings(&self) -> Eviction {
        match self.store.evict_prefix(LISTING_NAMESPACE).await {
            EvictOutcome::Evicted(evicted) => {
                info!(prefix = LISTING_NAMESPACE, evicted, "Evicted cached listings");
                Eviction::Prefix { evicted }
            }
            EvictOutcome::Unsupported => {
                warn!(
                    prefix = LISTING_NAMESPACE,
                    "Prefix eviction unsupported; clearing the whole cache store"
                );
                self.store.clear().await;
                counter!(METRIC_CACHE_CLEAR_FALLBACK_TOTAL).increment(1);
                Eviction::Cleared
            }
        }
    }
}
