//! Dynamic page fetcher
//!
//! Loads a page in a fresh browsing session and scrolls until the document
//! height stops changing, so lazily appended catalog items and swapped-in
//! images are present in the captured markup.
//!
//! The loop is bounded by [`FetchProfile::max_iterations`]. Hitting the cap
//! is not an error: the markup gathered so far is returned with
//! `converged = false`.

#![allow(clippy::uninlined_format_args)]

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::errors::CatalogResult;
use crate::domain::services::{FetchProfile, PageFetcher, RenderedPage};
use crate::infrastructure::config::BrowserConfig;
use crate::infrastructure::retry_policy::RetryPolicy;
use crate::infrastructure::webdriver::{BrowserLauncher, BrowserSession};

impl FetchProfile {
    /// Long settle for the lazily loaded catalog listing
    pub fn catalog(config: &BrowserConfig) -> Self {
        Self {
            initial_wait: std::time::Duration::from_millis(config.initial_wait_ms),
            settle: std::time::Duration::from_millis(config.catalog_settle_ms),
            max_iterations: config.max_scroll_iterations,
        }
    }

    /// Short settle for product detail pages
    pub fn detail(config: &BrowserConfig) -> Self {
        Self {
            initial_wait: std::time::Duration::from_millis(config.detail_settle_ms),
            settle: std::time::Duration::from_millis(config.detail_settle_ms),
            max_iterations: config.detail_max_scroll_iterations,
        }
    }
}

/// Drive the scroll/measure loop on an already opened session
pub async fn settle_and_capture(
    session: &dyn BrowserSession,
    url: &str,
    profile: FetchProfile,
) -> CatalogResult<RenderedPage> {
    session.navigate(url).await?;
    sleep(profile.initial_wait).await;

    let mut last_height = session.scroll_height().await?;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < profile.max_iterations {
        iterations += 1;
        session.scroll_to_bottom().await?;
        sleep(profile.settle).await;

        let height = session.scroll_height().await?;
        debug!("Scroll {} on {}: height {} -> {}", iterations, url, last_height, height);
        if height == last_height {
            converged = true;
            break;
        }
        last_height = height;
    }

    if !converged {
        warn!(
            "Page {} still growing after {} scrolls, keeping partial content",
            url, iterations
        );
    }

    let html = session.page_source().await?;
    Ok(RenderedPage {
        html,
        converged,
        iterations,
    })
}

pub struct DynamicPageFetcher<L: BrowserLauncher> {
    launcher: L,
    retry: RetryPolicy,
}

impl<L: BrowserLauncher> DynamicPageFetcher<L> {
    pub fn new(launcher: L, retry: RetryPolicy) -> Self {
        Self { launcher, retry }
    }

    /// One attempt: own session, closed whatever the outcome
    async fn fetch_once(&self, url: &str, profile: FetchProfile) -> CatalogResult<RenderedPage> {
        let session = self.launcher.open_session().await?;
        let result = settle_and_capture(session.as_ref(), url, profile).await;
        session.close().await;
        result
    }
}

#[async_trait]
impl<L: BrowserLauncher> PageFetcher for DynamicPageFetcher<L> {
    async fn fetch_rendered(&self, url: &str, profile: FetchProfile) -> CatalogResult<RenderedPage> {
        info!(url = %url, "Rendering page");
        let page = self
            .retry
            .run(url, |_| self.fetch_once(url, profile))
            .await?;
        debug!(
            "Rendered {} ({} chars, {} scrolls, converged: {})",
            url,
            page.html.len(),
            page.iterations,
            page.converged
        );
        Ok(page)
    }
}
