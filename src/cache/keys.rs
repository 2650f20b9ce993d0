//! Response cache key derivation.
//!
//! Keys look like `products:list:<endpoint>:<sha256 of canonical query>`.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::application::filters::Endpoint;

use super::config::LISTING_NAMESPACE;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResponseKey(String);

impl ResponseKey {
    /// Key for a listing payload. `canonical_query` must already be normalized
    /// (sorted by name, then value).
    pub fn listing(endpoint: Endpoint, canonical_query: &str) -> Self {
        Self(format!(
            "{}:{}",
            listing_prefix(endpoint),
            hash_query(canonical_query)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Namespace for one endpoint's listing payloads.
pub fn listing_prefix(endpoint: Endpoint) -> String {
    format!("{LISTING_NAMESPACE}:{}", endpoint.as_str())
}

/// Hex SHA-256 of a canonical query string.
pub fn hash_query(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hex::encode(hasher.finalize())
}
