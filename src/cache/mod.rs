//! Listing response cache.
//!
//! Rendered listing payloads are cached under `products:list:<endpoint>:<hash>`
//! and evicted wholesale whenever a product changes:
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 300
//! capacity = 1024
//! ```

mod config;
mod events;
mod keys;
mod listener;
pub(crate) mod lock;
mod response;
mod store;

pub use config::{CacheConfig, LISTING_NAMESPACE};
pub use events::{Epoch, EventQueue, InvalidationEvent};
pub use keys::{ResponseKey, hash_query, listing_prefix};
pub use listener::{CacheInvalidator, InvalidationPass};
pub use response::{Eviction, ResponseCache};
pub use store::{CachePayload, CacheStore, EvictOutcome, MemoryStore, StoredPayload};
