//! Postgres-backed catalog store.

mod listen;
mod rows;
mod util;

pub use listen::{PRODUCT_CHANGED_CHANNEL, spawn_change_listener};
pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres, QueryBuilder, Row,
    postgres::{PgPool, PgPoolOptions},
    query,
};
use tracing::warn;

use crate::application::filters::FilterPredicate;
use crate::application::repos::{CatalogRepo, GroupCounts, GroupField, GroupValue, RepoError};
use crate::domain::buckets::PriceBucket;
use crate::domain::entities::{BrandRecord, CategoryRecord, ProductRecord};
use crate::domain::types::ProductStatus;

use rows::{BrandRow, CategoryRow, ProductRow};

const PRODUCT_COLUMNS: &str = "SELECT p.id, p.name, p.category_id, p.brand_id, p.status, \
     p.price_cents, p.stock, p.created_at FROM products p";
const NEWEST_FIRST: &str = " ORDER BY p.created_at DESC, p.id DESC";

#[derive(Clone)]
pub struct PostgresCatalog {
    pool: Arc<PgPool>,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Append the predicate as ` WHERE ...` conditions on alias `p`.
    fn apply_predicate<'q>(qb: &mut QueryBuilder<'q, Postgres>, predicate: &FilterPredicate) {
        qb.push(" WHERE 1=1");

        if !predicate.categories().is_empty() {
            let ids: Vec<i64> = predicate.categories().iter().copied().collect();
            qb.push(" AND p.category_id = ANY(");
            qb.push_bind(ids);
            qb.push(")");
        }

        if !predicate.brands().is_empty() {
            let ids: Vec<i64> = predicate.brands().iter().copied().collect();
            qb.push(" AND p.brand_id = ANY(");
            qb.push_bind(ids);
            qb.push(")");
        }

        if !predicate.statuses().is_empty() {
            let statuses: Vec<String> = predicate
                .statuses()
                .iter()
                .map(|status| status.as_str().to_string())
                .collect();
            qb.push(" AND p.status = ANY(");
            qb.push_bind(statuses);
            qb.push(")");
        }

        if let Some(constraint) = predicate.price() {
            let range = constraint.range();
            if let Some(min) = range.min {
                qb.push(if min.inclusive {
                    " AND p.price_cents >= "
                } else {
                    " AND p.price_cents > "
                });
                qb.push_bind(min.value.cents());
            }
            if let Some(max) = range.max {
                qb.push(if max.inclusive {
                    " AND p.price_cents <= "
                } else {
                    " AND p.price_cents < "
                });
                qb.push_bind(max.value.cents());
            }
        }
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }

    async fn fetch_products(
        &self,
        mut qb: QueryBuilder<'_, Postgres>,
    ) -> Result<Vec<ProductRecord>, RepoError> {
        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(ProductRecord::try_from).collect()
    }

    async fn grouped_counts(
        &self,
        column: &str,
        predicate: &FilterPredicate,
    ) -> Result<Vec<(sqlx::postgres::PgRow, u64)>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT p.");
        qb.push(column);
        qb.push(" AS group_key, COUNT(*) AS total FROM products p");
        Self::apply_predicate(&mut qb, predicate);
        qb.push(" GROUP BY p.");
        qb.push(column);

        let rows = qb
            .build()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter()
            .map(|row| {
                let total: i64 = row.try_get("total").map_err(map_sqlx_error)?;
                Ok((row, Self::convert_count(total)?))
            })
            .collect()
    }

    async fn bucket_counts(&self, predicate: &FilterPredicate) -> Result<GroupCounts, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        for (index, bucket) in PriceBucket::ALL.iter().enumerate() {
            if index > 0 {
                qb.push(", ");
            }
            qb.push("COUNT(*) FILTER (WHERE p.price_cents >= ");
            qb.push_bind(bucket.lower().cents());
            qb.push(if bucket.upper_inclusive() {
                " AND p.price_cents <= "
            } else {
                " AND p.price_cents < "
            });
            qb.push_bind(bucket.upper().cents());
            qb.push(")");
        }
        qb.push(" FROM products p");
        Self::apply_predicate(&mut qb, predicate);

        let row = qb
            .build()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut counts = GroupCounts::new();
        for (index, bucket) in PriceBucket::ALL.into_iter().enumerate() {
            let total: i64 = row.try_get(index).map_err(map_sqlx_error)?;
            counts.insert(GroupValue::PriceBucket(bucket), Self::convert_count(total)?);
        }
        Ok(counts)
    }
}

#[async_trait]
impl CatalogRepo for PostgresCatalog {
    async fn query(&self, predicate: &FilterPredicate) -> Result<Vec<ProductRecord>, RepoError> {
        let mut qb = QueryBuilder::new(PRODUCT_COLUMNS);
        Self::apply_predicate(&mut qb, predicate);
        qb.push(NEWEST_FIRST);
        self.fetch_products(qb).await
    }

    async fn query_page(
        &self,
        predicate: &FilterPredicate,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ProductRecord>, RepoError> {
        let to_i64 = |value: u64| {
            i64::try_from(value).map_err(|_| RepoError::from_persistence("page bound out of range"))
        };

        let mut qb = QueryBuilder::new(PRODUCT_COLUMNS);
        Self::apply_predicate(&mut qb, predicate);
        qb.push(NEWEST_FIRST);
        qb.push(" LIMIT ");
        qb.push_bind(to_i64(limit)?);
        qb.push(" OFFSET ");
        qb.push_bind(to_i64(offset)?);
        self.fetch_products(qb).await
    }

    async fn count(&self, predicate: &FilterPredicate) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM products p");
        Self::apply_predicate(&mut qb, predicate);
        let total: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(total)
    }

    async fn aggregate_count(
        &self,
        field: GroupField,
        predicate: &FilterPredicate,
    ) -> Result<GroupCounts, RepoError> {
        let mut counts = GroupCounts::new();
        match field {
            GroupField::Category => {
                for (row, total) in self.grouped_counts("category_id", predicate).await? {
                    let id: i64 = row.try_get("group_key").map_err(map_sqlx_error)?;
                    counts.insert(GroupValue::Category(id), total);
                }
            }
            GroupField::Status => {
                for (row, total) in self.grouped_counts("status", predicate).await? {
                    let raw: String = row.try_get("group_key").map_err(map_sqlx_error)?;
                    match raw.parse::<ProductStatus>() {
                        Ok(status) => {
                            counts.insert(GroupValue::Status(status), total);
                        }
                        Err(_) => warn!(status = %raw, total, "Skipping unknown product status"),
                    }
                }
            }
            GroupField::PriceBucket => return self.bucket_counts(predicate).await,
        }
        Ok(counts)
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, product_count FROM categories ORDER BY name, id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(CategoryRecord::from).collect())
    }

    async fn list_brands(&self) -> Result<Vec<BrandRecord>, RepoError> {
        let rows = sqlx::query_as::<_, BrandRow>("SELECT id, name FROM brands ORDER BY name, id")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(BrandRecord::from).collect())
    }
}
