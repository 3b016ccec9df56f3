//! Domain services
//!
//! Interfaces for the outside capabilities the crawl and classification
//! passes depend on: a scriptable browser, a plain HTTP GET and an
//! image classifier.

use async_trait::async_trait;
use std::time::Duration;

use super::errors::CatalogResult;

/// How long to let a dynamically loaded page settle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProfile {
    /// Wait after navigation before the first height measurement
    pub initial_wait: Duration,
    /// Wait after each scroll to the bottom
    pub settle: Duration,
    /// Scroll iterations before giving up on convergence
    pub max_iterations: u32,
}

/// Final markup of a dynamically loaded page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub html: String,
    /// False when the scroll loop hit its cap before the height stopped changing
    pub converged: bool,
    pub iterations: u32,
}

/// Loads a page in a headless browsing session and returns its rendered markup.
///
/// Implementations open a fresh session per call and close it on every exit path.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_rendered(&self, url: &str, profile: FetchProfile) -> CatalogResult<RenderedPage>;
}

/// Plain document fetch for static pages
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch_document(&self, url: &str) -> CatalogResult<String>;
}

/// External image classifier; returns whatever free text the model produced
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify_image(&self, image_url: &str, vocabulary: &[&str]) -> CatalogResult<String>;
}
