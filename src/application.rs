//! Application layer
//!
//! Use cases composed from the domain rules and infrastructure adapters:
//! the crawl, the classification pass and the read-only catalog queries.

pub mod catalog_queries;
pub mod category_classifier;
pub mod crawl_orchestrator;
pub mod variant_resolver;

pub use catalog_queries::{CatalogQueries, QueryRecord, SearchFilters, records_to_json};
pub use category_classifier::{CategoryClassifier, ClassificationSummary};
pub use crawl_orchestrator::{CrawlOrchestrator, CrawlSummary};
pub use variant_resolver::VariantResolver;
