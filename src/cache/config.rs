//! Response cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_INVALIDATION_INTERVAL_MS: u64 = 1000;
const DEFAULT_INVALIDATION_BATCH_LIMIT: usize = 256;

/// Namespace every listing payload key lives under; invalidation evicts it
/// wholesale.
pub const LISTING_NAMESPACE: &str = "products:list";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve listing payloads from the response cache.
    pub enabled: bool,
    /// Lifetime of a cached payload.
    pub ttl_seconds: u64,
    /// Maximum payloads held by the in-memory store.
    pub capacity: usize,
    /// Fallback cadence (ms) for draining queued change events when no
    /// wake-up arrives.
    pub invalidation_interval_ms: u64,
    /// Maximum change events acknowledged by one eviction pass.
    pub invalidation_batch_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            capacity: DEFAULT_CAPACITY,
            invalidation_interval_ms: DEFAULT_INVALIDATION_INTERVAL_MS,
            invalidation_batch_limit: DEFAULT_INVALIDATION_BATCH_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl_seconds: settings.ttl.as_secs(),
            capacity: settings.capacity.get(),
            invalidation_interval_ms: settings.invalidation_interval.as_millis() as u64,
            invalidation_batch_limit: settings.invalidation_batch_limit.get(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds.max(1))
    }

    pub fn invalidation_interval(&self) -> Duration {
        Duration::from_millis(self.invalidation_interval_ms.max(1))
    }

    /// Capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn batch_limit(&self) -> usize {
        self.invalidation_batch_limit.max(1)
    }
}
