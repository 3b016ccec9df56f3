//! Domain module - Core catalog entities and rules
//!
//! Pure types and functions with no I/O: product records, the price/text
//! normalizer, query filters, the error taxonomy and repository contracts.

pub mod errors;
pub mod normalization;
pub mod product;
pub mod query;
pub mod repositories;
pub mod services;

// Re-export commonly used items
pub use errors::{CatalogError, CatalogResult};
pub use product::{CatalogCard, Category, ProductVariant, ScrapedVariant};
pub use query::{ProductQuery, PromotionFilter};
pub use repositories::ProductRepository;
pub use services::{DocumentFetcher, FetchProfile, ImageClassifier, PageFetcher, RenderedPage};
