use time::OffsetDateTime;

use crate::application::repos::RepoError;
use crate::domain::entities::{BrandRecord, CategoryRecord, ProductRecord};
use crate::domain::types::{Price, ProductStatus};

#[derive(sqlx::FromRow)]
pub(crate) struct ProductRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) category_id: i64,
    pub(crate) brand_id: Option<i64>,
    pub(crate) status: String,
    pub(crate) price_cents: i64,
    pub(crate) stock: i32,
    pub(crate) created_at: OffsetDateTime,
}

impl TryFrom<ProductRow> for ProductRecord {
    type Error = RepoError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<ProductStatus>().map_err(|_| {
            RepoError::integrity(format!("product {} has unknown status `{}`", row.id, row.status))
        })?;
        let price = Price::from_cents(row.price_cents).map_err(|_| {
            RepoError::integrity(format!("product {} has negative price", row.id))
        })?;
        let stock = u32::try_from(row.stock).map_err(|_| {
            RepoError::integrity(format!("product {} has negative stock", row.id))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            category_id: row.category_id,
            brand_id: row.brand_id,
            status,
            price,
            stock,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CategoryRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) product_count: i32,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            product_count: u64::try_from(row.product_count).unwrap_or(0),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BrandRow {
    pub(crate) id: i64,
    pub(crate) name: String,
}

impl From<BrandRow> for BrandRecord {
    fn from(row: BrandRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ProductRow {
        ProductRow {
            id: 7,
            name: "Desk lamp".to_string(),
            category_id: 1,
            brand_id: None,
            status: "active".to_string(),
            price_cents: 4_999,
            stock: 3,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn valid_row_converts() {
        let record = ProductRecord::try_from(row()).expect("record");
        assert_eq!(record.price, Price::from_cents(4_999).expect("price"));
        assert_eq!(record.status, ProductStatus::Active);
    }

    #[test]
    fn corrupt_rows_are_integrity_errors() {
        let bad_status = ProductRow {
            status: "archived".to_string(),
            ..row()
        };
        assert!(matches!(
            ProductRecord::try_from(bad_status),
            Err(RepoError::Integrity { .. })
        ));

        let negative_stock = ProductRow { stock: -1, ..row() };
        assert!(matches!(
            ProductRecord::try_from(negative_stock),
            Err(RepoError::Integrity { .. })
        ));
    }
}
