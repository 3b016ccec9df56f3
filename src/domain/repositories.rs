//! Repository interfaces for the product store
//!
//! The store's unit of mutation is one row keyed by variant id; no operation
//! spans several rows in a transaction.

use async_trait::async_trait;

use super::errors::CatalogResult;
use super::product::{Category, ProductVariant};
use super::query::ProductQuery;

/// Row handed to the classification pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationCandidate {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Insert, or replace every column of an existing row with the same id
    async fn upsert(&self, variant: &ProductVariant) -> CatalogResult<()>;

    /// Filtered read in randomized order, capped at `query.limit` rows
    async fn query(&self, query: &ProductQuery) -> CatalogResult<Vec<ProductVariant>>;

    async fn find_by_id(&self, id: &str) -> CatalogResult<Option<ProductVariant>>;

    async fn list_for_classification(
        &self,
        only_unclassified: bool,
    ) -> CatalogResult<Vec<ClassificationCandidate>>;

    async fn set_category(&self, id: &str, category: Category) -> CatalogResult<()>;

    async fn count(&self) -> CatalogResult<u64>;
}
