//! Read-only catalog queries for assistant front ends
//!
//! Three searches share one filter set: everything, discounted only, and new
//! or upcoming releases only. Results are small records meant to be handed
//! to a chat model as JSON text. No match is an empty list, never an error.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::CatalogResult;
use crate::domain::product::{Category, ProductVariant};
use crate::domain::query::{DEFAULT_QUERY_LIMIT, ProductQuery, PromotionFilter};
use crate::domain::repositories::ProductRepository;

/// Optional filters accepted by every search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub name: Option<String>,
    pub max_price: Option<f64>,
    /// Comma or space separated; any term may match
    pub colors: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub name: String,
    pub price: f64,
    pub colors: Option<String>,
    pub discount: Option<u8>,
    pub description: Option<String>,
}

impl From<ProductVariant> for QueryRecord {
    fn from(variant: ProductVariant) -> Self {
        Self {
            name: variant.name,
            price: variant.current_price,
            colors: variant.colors,
            discount: variant.discount_percent,
            description: variant.description,
        }
    }
}

/// Serialize records for the chat model
pub fn records_to_json(records: &[QueryRecord]) -> String {
    serde_json::to_string(records).unwrap_or_else(|_| "[]".to_string())
}

pub struct CatalogQueries {
    repository: Arc<dyn ProductRepository>,
}

impl CatalogQueries {
    pub fn new(repository: Arc<dyn ProductRepository>) -> Self {
        Self { repository }
    }

    pub async fn search(&self, filters: &SearchFilters, limit: Option<u32>) -> CatalogResult<Vec<QueryRecord>> {
        self.run(filters, limit, PromotionFilter::Any).await
    }

    pub async fn search_discounted(
        &self,
        filters: &SearchFilters,
        limit: Option<u32>,
    ) -> CatalogResult<Vec<QueryRecord>> {
        self.run(filters, limit, PromotionFilter::Discounted).await
    }

    /// Rows labelled "Just In" or "Coming Soon"
    pub async fn search_new_releases(
        &self,
        filters: &SearchFilters,
        limit: Option<u32>,
    ) -> CatalogResult<Vec<QueryRecord>> {
        self.run(filters, limit, PromotionFilter::NewReleases).await
    }

    async fn run(
        &self,
        filters: &SearchFilters,
        limit: Option<u32>,
        promotion: PromotionFilter,
    ) -> CatalogResult<Vec<QueryRecord>> {
        let Some(query) = build_query(filters, limit.unwrap_or(DEFAULT_QUERY_LIMIT), promotion) else {
            return Ok(Vec::new());
        };
        let rows = self.repository.query(&query).await?;
        debug!("Query {:?} matched {} rows", promotion, rows.len());
        Ok(rows.into_iter().map(QueryRecord::from).collect())
    }
}

/// `None` when the filters cannot match anything (unknown category token)
fn build_query(filters: &SearchFilters, limit: u32, promotion: PromotionFilter) -> Option<ProductQuery> {
    let mut query = ProductQuery::new(limit).with_promotion(promotion);

    if let Some(name) = &filters.name {
        query = query.with_name(name);
    }
    if let Some(max_price) = filters.max_price {
        query = query.with_max_price(max_price);
    }
    if let Some(colors) = &filters.colors {
        query = query.with_colors(colors);
    }
    if let Some(description) = &filters.description {
        query = query.with_description(description);
    }
    if let Some(category) = filters.category.as_deref().filter(|c| !c.trim().is_empty()) {
        match category.parse::<Category>() {
            Ok(category) => query = query.with_category(category),
            Err(e) => {
                debug!("No rows can match: {}", e);
                return None;
            }
        }
    }

    Some(query)
}
