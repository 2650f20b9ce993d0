//! Storage collaborator interface for the product catalog.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::application::filters::FilterPredicate;
use crate::domain::buckets::PriceBucket;
use crate::domain::entities::{BrandRecord, CategoryId, CategoryRecord, ProductRecord};
use crate::domain::types::ProductStatus;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("catalog store unavailable: {0}")]
    Unavailable(String),
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("resource not found")]
    NotFound,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

/// Field a count aggregation groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupField {
    Category,
    Status,
    PriceBucket,
}

/// One group produced by [`CatalogRepo::aggregate_count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupValue {
    Category(CategoryId),
    Status(ProductStatus),
    PriceBucket(PriceBucket),
}

/// Group value to matching row count. Groups with no rows may be absent.
pub type GroupCounts = HashMap<GroupValue, u64>;

/// Read-only view of the catalog store.
///
/// Implementations must order `query` results newest first (`created_at`
/// descending, then id descending) and keep `count(p) == query(p).len()`.
#[async_trait]
pub trait CatalogRepo: Send + Sync {
    async fn query(&self, predicate: &FilterPredicate) -> Result<Vec<ProductRecord>, RepoError>;

    /// A window of `query(predicate)`; stores that can push the limit down
    /// should override this.
    async fn query_page(
        &self,
        predicate: &FilterPredicate,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ProductRecord>, RepoError> {
        let rows = self.query(predicate).await?;
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self, predicate: &FilterPredicate) -> Result<u64, RepoError>;

    async fn aggregate_count(
        &self,
        field: GroupField,
        predicate: &FilterPredicate,
    ) -> Result<GroupCounts, RepoError>;

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError>;

    async fn list_brands(&self) -> Result<Vec<BrandRecord>, RepoError>;
}
