//! SQLite implementation of the product store
//!
//! One row per variant id. Writes are single-statement `INSERT OR REPLACE`,
//! so concurrent crawl workers never leave a half-written row behind.

#![allow(clippy::uninlined_format_args)]

use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, warn};

use crate::domain::errors::{CatalogError, CatalogResult};
use crate::domain::product::{Category, NEW_RELEASE_STATUSES, ProductVariant};
use crate::domain::query::{ProductQuery, PromotionFilter};
use crate::domain::repositories::{ClassificationCandidate, ProductRepository};

const SELECT_COLUMNS: &str = "SELECT id, name, category, promotion_status, current_price, \
     discount_percent, colors, source_url, image_url, description FROM products";

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    name: String,
    category: Option<String>,
    promotion_status: Option<String>,
    current_price: f64,
    discount_percent: Option<i64>,
    colors: Option<String>,
    source_url: String,
    image_url: Option<String>,
    description: Option<String>,
}

impl From<ProductRow> for ProductVariant {
    fn from(row: ProductRow) -> Self {
        let category = row.category.as_deref().and_then(|value| match value.parse::<Category>() {
            Ok(category) => Some(category),
            Err(e) => {
                warn!("Ignoring stored category for {}: {}", row.id, e);
                None
            }
        });

        Self {
            category,
            discount_percent: row.discount_percent.and_then(|d| u8::try_from(d).ok()),
            id: row.id,
            name: row.name,
            promotion_status: row.promotion_status,
            current_price: row.current_price,
            colors: row.colors,
            source_url: row.source_url,
            image_url: row.image_url,
            description: row.description,
        }
    }
}

fn read_failure(error: &sqlx::Error) -> CatalogError {
    CatalogError::StoreReadFailure {
        reason: error.to_string(),
    }
}

fn like_pattern(term: &str) -> String {
    format!("%{term}%")
}

/// Append the WHERE clause for `query`; every filter is optional and ANDed
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ProductQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(name) = &query.name {
        builder.push(" AND name LIKE ").push_bind(like_pattern(name));
    }
    if let Some(max_price) = query.max_price {
        builder.push(" AND current_price <= ").push_bind(max_price);
    }
    if !query.colors.is_empty() {
        builder.push(" AND (");
        let mut any_color = builder.separated(" OR ");
        for color in &query.colors {
            any_color
                .push("colors LIKE ")
                .push_bind_unseparated(like_pattern(color));
        }
        builder.push(")");
    }
    if let Some(description) = &query.description {
        builder
            .push(" AND description LIKE ")
            .push_bind(like_pattern(description));
    }
    if let Some(category) = query.category {
        builder.push(" AND category = ").push_bind(category.as_str());
    }

    match query.promotion {
        PromotionFilter::Any => {}
        PromotionFilter::Discounted => {
            builder.push(" AND discount_percent IS NOT NULL");
        }
        PromotionFilter::NewReleases => {
            builder.push(" AND ");
            push_new_release_predicate(builder);
        }
        PromotionFilter::PromotionPool => {
            builder.push(" AND (discount_percent IS NOT NULL OR ");
            push_new_release_predicate(builder);
            builder.push(")");
        }
    }
}

fn push_new_release_predicate(builder: &mut QueryBuilder<'_, Sqlite>) {
    builder.push("promotion_status IN (");
    let mut statuses = builder.separated(", ");
    for status in NEW_RELEASE_STATUSES {
        statuses.push_bind(status);
    }
    builder.push(")");
}

pub struct SqliteProductRepository {
    pool: SqlitePool,
}

impl SqliteProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn upsert(&self, variant: &ProductVariant) -> CatalogResult<()> {
        sqlx::query(
            r"
            INSERT OR REPLACE INTO products
                (id, name, category, promotion_status, current_price, discount_percent,
                 colors, source_url, image_url, description)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&variant.id)
        .bind(&variant.name)
        .bind(variant.category.map(|c| c.as_str()))
        .bind(&variant.promotion_status)
        .bind(variant.current_price)
        .bind(variant.discount_percent.map(i64::from))
        .bind(&variant.colors)
        .bind(&variant.source_url)
        .bind(&variant.image_url)
        .bind(&variant.description)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::StoreWriteFailure {
            id: variant.id.clone(),
            reason: e.to_string(),
        })?;

        debug!("Stored variant {}", variant.id);
        Ok(())
    }

    async fn query(&self, query: &ProductQuery) -> CatalogResult<Vec<ProductVariant>> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        push_filters(&mut builder, query);
        builder
            .push(" ORDER BY RANDOM() LIMIT ")
            .push_bind(i64::from(query.limit));

        let rows: Vec<ProductRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_failure(&e))?;

        Ok(rows.into_iter().map(ProductVariant::from).collect())
    }

    async fn find_by_id(&self, id: &str) -> CatalogResult<Option<ProductVariant>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_failure(&e))?;
        Ok(row.map(ProductVariant::from))
    }

    async fn list_for_classification(
        &self,
        only_unclassified: bool,
    ) -> CatalogResult<Vec<ClassificationCandidate>> {
        let sql = if only_unclassified {
            "SELECT id, name, image_url FROM products WHERE category IS NULL ORDER BY id"
        } else {
            "SELECT id, name, image_url FROM products ORDER BY id"
        };

        let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_failure(&e))?;

        Ok(rows
            .into_iter()
            .map(|(id, name, image_url)| ClassificationCandidate { id, name, image_url })
            .collect())
    }

    async fn set_category(&self, id: &str, category: Category) -> CatalogResult<()> {
        sqlx::query("UPDATE products SET category = ? WHERE id = ?")
            .bind(category.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::StoreWriteFailure {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn count(&self) -> CatalogResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| read_failure(&e))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
