//! Jordan Catalog - crawler, normalizer and classifier for a dynamically
//! loaded sneaker catalog
//!
//! The crawl renders the catalog listing in a headless browser, expands each
//! product card into its colorways, normalizes prices and text, and stores one
//! SQLite row per colorway. A separate pass assigns each row a category.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{CatalogQueries, CategoryClassifier, CrawlOrchestrator, CrawlSummary};
pub use domain::{CatalogError, CatalogResult, Category, ProductVariant};
