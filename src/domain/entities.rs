//! Domain entities mirrored from the catalog store.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::error::DomainError;
use crate::domain::types::{Price, ProductStatus};

pub const MAX_PRODUCT_NAME_LEN: usize = 200;

pub type ProductId = i64;
pub type CategoryId = i64;
pub type BrandId = i64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub category_id: CategoryId,
    pub brand_id: Option<BrandId>,
    pub status: ProductStatus,
    pub price: Price,
    pub stock: u32,
    pub created_at: OffsetDateTime,
}

/// A category as stored. `product_count` is a denormalized counter kept by the
/// write path and may lag the live data; facets never read it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub name: String,
    pub product_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandRecord {
    pub id: BrandId,
    pub name: String,
}

/// Input for creating or replacing a product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub category_id: CategoryId,
    pub brand_id: Option<BrandId>,
    pub status: ProductStatus,
    pub price: Price,
    pub stock: u32,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, category_id: CategoryId, price: Price) -> Self {
        Self {
            name: name.into(),
            category_id,
            brand_id: None,
            status: ProductStatus::Active,
            price,
            stock: 0,
        }
    }

    pub fn with_brand(mut self, brand_id: BrandId) -> Self {
        self.brand_id = Some(brand_id);
        self
    }

    pub fn with_status(mut self, status: ProductStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name must not be blank"));
        }
        if self.name.chars().count() > MAX_PRODUCT_NAME_LEN {
            return Err(DomainError::validation(format!(
                "product name exceeds {MAX_PRODUCT_NAME_LEN} characters"
            )));
        }
        Ok(())
    }
}
