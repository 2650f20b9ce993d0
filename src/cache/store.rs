//! Cache store interface and the in-memory LRU implementation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use tokio::time::Instant;

use crate::application::facets::FacetCounts;

use super::config::CacheConfig;
use super::events::Epoch;
use super::keys::ResponseKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
const METRIC_CACHE_EVICT_TOTAL: &str = "vetrina_cache_evict_total";

/// Rendered listing fragments plus the facet snapshot they were rendered with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachePayload {
    /// Primary product list fragment.
    pub html: String,
    /// Active-filter tags fragment.
    pub tags_html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<FacetCounts>,
}

/// A payload tagged with the invalidation generation it was computed under.
/// Readers treat entries from an older generation as absent, so a write that
/// lands after an eviction pass cannot resurrect stale listings.
#[derive(Debug, Clone)]
pub struct StoredPayload {
    pub generation: Epoch,
    pub payload: Arc<CachePayload>,
}

impl StoredPayload {
    pub fn new(generation: Epoch, payload: Arc<CachePayload>) -> Self {
        Self {
            generation,
            payload,
        }
    }
}

/// Result of a prefix eviction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictOutcome {
    Evicted(usize),
    /// The backend cannot enumerate keys; callers fall back to [`CacheStore::clear`].
    Unsupported,
}

/// Shared payload store. Individual operations are atomic per key; there is no
/// cross-key transaction.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &ResponseKey) -> Option<StoredPayload>;

    async fn set(&self, key: ResponseKey, stored: StoredPayload, ttl: Duration);

    async fn evict_prefix(&self, prefix: &str) -> EvictOutcome;

    async fn clear(&self);
}

struct Entry {
    stored: StoredPayload,
    expires_at: Instant,
}

/// Bounded in-process store with per-entry expiry and prefix eviction.
pub struct MemoryStore {
    entries: RwLock<LruCache<ResponseKey, Entry>>,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &ResponseKey) -> Option<StoredPayload> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.stored.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
            counter!(METRIC_CACHE_EVICT_TOTAL, "reason" => "expired").increment(1);
        }
        None
    }

    async fn set(&self, key: ResponseKey, stored: StoredPayload, ttl: Duration) {
        let entry = Entry {
            stored,
            expires_at: Instant::now() + ttl,
        };
        let displaced = rw_write(&self.entries, SOURCE, "set").push(key.clone(), entry);
        if let Some((displaced_key, _)) = displaced
            && displaced_key != key
        {
            counter!(METRIC_CACHE_EVICT_TOTAL, "reason" => "capacity").increment(1);
        }
    }

    async fn evict_prefix(&self, prefix: &str) -> EvictOutcome {
        let mut entries = rw_write(&self.entries, SOURCE, "evict_prefix");
        let doomed: Vec<ResponseKey> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        counter!(METRIC_CACHE_EVICT_TOTAL, "reason" => "invalidated").increment(doomed.len() as u64);
        EvictOutcome::Evicted(doomed.len())
    }

    async fn clear(&self) {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        counter!(METRIC_CACHE_EVICT_TOTAL, "reason" => "cleared").increment(entries.len() as u64);
        entries.clear();
    }
}
