//! Crawl orchestration
//!
//! fetch catalog -> extract cards -> resolve each card's colorways ->
//! normalize -> upsert.
//!
//! Cards run through a bounded `buffer_unordered` pool; with the default
//! concurrency of 1 the crawl is strictly sequential. A single product never
//! ends the run. Only a failed catalog fetch or a browser session that cannot
//! be started at all stops it early.

#![allow(clippy::uninlined_format_args)]

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::application::variant_resolver::VariantResolver;
use crate::domain::normalization::normalize_variant;
use crate::domain::product::CatalogCard;
use crate::domain::repositories::ProductRepository;
use crate::domain::services::{FetchProfile, PageFetcher};
use crate::infrastructure::config::CrawlConfig;
use crate::infrastructure::parsing::CardExtractor;

/// Outcome of one crawl run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cards_seen: usize,
    pub cards_skipped: usize,
    pub cards_not_started: usize,
    pub variants_stored: usize,
    /// Variants dropped for an unusable price
    pub variants_rejected: usize,
    pub colorway_failures: usize,
    pub store_failures: usize,
    /// The catalog scroll loop hit its cap before the page stopped growing
    pub partial_catalog: bool,
    pub cancelled: bool,
    /// Set when a session failure ended the run early
    pub aborted: Option<String>,
}

/// Per-card tallies folded into the summary
#[derive(Debug, Default)]
struct CardOutcome {
    not_started: bool,
    skipped: bool,
    stored: usize,
    rejected: usize,
    colorway_failures: usize,
    store_failures: usize,
    fatal: Option<String>,
}

pub struct CrawlOrchestrator {
    page_fetcher: Arc<dyn PageFetcher>,
    extractor: CardExtractor,
    resolver: VariantResolver,
    repository: Arc<dyn ProductRepository>,
    catalog_url: String,
    catalog_profile: FetchProfile,
    settings: CrawlConfig,
}

impl CrawlOrchestrator {
    pub fn new(
        page_fetcher: Arc<dyn PageFetcher>,
        extractor: CardExtractor,
        resolver: VariantResolver,
        repository: Arc<dyn ProductRepository>,
        catalog_url: impl Into<String>,
        catalog_profile: FetchProfile,
        settings: CrawlConfig,
    ) -> Self {
        Self {
            page_fetcher,
            extractor,
            resolver,
            repository,
            catalog_url: catalog_url.into(),
            catalog_profile,
            settings,
        }
    }

    /// Crawl the catalog once.
    ///
    /// Cancelling `cancel` stops new cards from starting; cards already in
    /// flight finish.
    pub async fn run(&self, cancel: &CancellationToken) -> anyhow::Result<CrawlSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("crawl", run_id = %run_id);
        self.run_inner(run_id, cancel).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, cancel: &CancellationToken) -> anyhow::Result<CrawlSummary> {
        let started_at = Utc::now();
        info!("Starting crawl of {}", self.catalog_url);

        let catalog = self
            .page_fetcher
            .fetch_rendered(&self.catalog_url, self.catalog_profile)
            .await
            .map_err(|e| anyhow::anyhow!("Catalog page could not be loaded: {e}"))?;
        if !catalog.converged {
            warn!("Catalog did not finish loading; crawling the cards found so far");
        }

        let mut cards = self.extractor.extract_cards(&catalog.html);
        if self.settings.max_cards > 0 && cards.len() > self.settings.max_cards {
            info!("Limiting crawl to {} of {} cards", self.settings.max_cards, cards.len());
            cards.truncate(self.settings.max_cards);
        }
        info!("Found {} product cards", cards.len());

        let mut summary = CrawlSummary {
            run_id,
            started_at,
            finished_at: started_at,
            cards_seen: cards.len(),
            cards_skipped: 0,
            cards_not_started: 0,
            variants_stored: 0,
            variants_rejected: 0,
            colorway_failures: 0,
            store_failures: 0,
            partial_catalog: !catalog.converged,
            cancelled: false,
            aborted: None,
        };

        // Stops new cards on user cancel or on a fatal session error
        let stop = cancel.child_token();
        let total = cards.len();
        let mut outcomes = stream::iter(cards.into_iter().enumerate())
            .map(|(index, card)| {
                let stop = stop.clone();
                async move { self.process_card(index, total, card, &stop).await }
            })
            .buffer_unordered(self.settings.detail_concurrency.max(1));

        while let Some(outcome) = outcomes.next().await {
            summary.cards_not_started += usize::from(outcome.not_started);
            summary.cards_skipped += usize::from(outcome.skipped);
            summary.variants_stored += outcome.stored;
            summary.variants_rejected += outcome.rejected;
            summary.colorway_failures += outcome.colorway_failures;
            summary.store_failures += outcome.store_failures;
            if summary.aborted.is_none() {
                summary.aborted = outcome.fatal;
            }
        }

        summary.cancelled = cancel.is_cancelled();
        summary.finished_at = Utc::now();

        info!(
            "Crawl finished: {} cards, {} skipped, {} variants stored, {} rejected, {} store failures{}{}",
            summary.cards_seen,
            summary.cards_skipped,
            summary.variants_stored,
            summary.variants_rejected,
            summary.store_failures,
            if summary.cancelled { " (cancelled)" } else { "" },
            if summary.aborted.is_some() { " (aborted)" } else { "" },
        );
        Ok(summary)
    }

    async fn process_card(
        &self,
        index: usize,
        total: usize,
        card: CatalogCard,
        stop: &CancellationToken,
    ) -> CardOutcome {
        let mut outcome = CardOutcome::default();
        if stop.is_cancelled() {
            outcome.not_started = true;
            return outcome;
        }

        info!("[{}/{}] {}", index + 1, total, card.name);
        let resolved = match self.resolver.resolve_variants(&card).await {
            Ok(resolved) => resolved,
            Err(e) if !e.is_recoverable() => {
                error!(url = %card.detail_url, "Stopping crawl: {}", e);
                stop.cancel();
                outcome.skipped = true;
                outcome.fatal = Some(e.to_string());
                return outcome;
            }
            Err(e) => {
                warn!(name = %card.name, url = %card.detail_url, "Skipping card: {}", e);
                outcome.skipped = true;
                return outcome;
            }
        };
        outcome.colorway_failures = resolved.failed_colorways;

        for scraped in resolved.variants {
            let id = scraped.id.clone();
            let url = scraped.source_url.clone();
            let variant = match normalize_variant(scraped) {
                Ok(variant) => variant,
                Err(e) => {
                    warn!(name = %card.name, id = %id, url = %url, "Rejected variant: {}", e);
                    outcome.rejected += 1;
                    continue;
                }
            };

            match self.repository.upsert(&variant).await {
                Ok(()) => {
                    debug!(id = %variant.id, "Stored {}", variant.name);
                    outcome.stored += 1;
                }
                Err(e) => {
                    error!(id = %variant.id, "{}", e);
                    outcome.store_failures += 1;
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{CatalogError, CatalogResult};
    use crate::domain::product::{Category, ProductVariant};
    use crate::domain::query::ProductQuery;
    use crate::domain::repositories::ClassificationCandidate;
    use crate::domain::services::{DocumentFetcher, RenderedPage};
    use crate::infrastructure::parsing::DetailPageParser;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    const CATALOG: &str = "https://shop.example/w/jordan";

    struct Pages {
        pages: HashMap<String, CatalogResult<String>>,
        converged: bool,
    }

    #[async_trait]
    impl PageFetcher for Pages {
        async fn fetch_rendered(&self, url: &str, _profile: FetchProfile) -> CatalogResult<RenderedPage> {
            let html = self
                .pages
                .get(url)
                .cloned()
                .unwrap_or_else(|| Err(CatalogError::FetchTimeout { url: url.into() }))?;
            Ok(RenderedPage {
                html,
                converged: self.converged,
                iterations: 1,
            })
        }
    }

    struct NoDocuments;

    #[async_trait]
    impl DocumentFetcher for NoDocuments {
        async fn fetch_document(&self, url: &str) -> CatalogResult<String> {
            Err(CatalogError::fetch_unavailable(url, "offline"))
        }
    }

    #[derive(Default)]
    struct MemoryRepository {
        rows: Mutex<HashMap<String, ProductVariant>>,
        fail_ids: Vec<String>,
    }

    #[async_trait]
    impl ProductRepository for MemoryRepository {
        async fn upsert(&self, variant: &ProductVariant) -> CatalogResult<()> {
            if self.fail_ids.contains(&variant.id) {
                return Err(CatalogError::StoreWriteFailure {
                    id: variant.id.clone(),
                    reason: "disk full".into(),
                });
            }
            self.rows.lock().unwrap().insert(variant.id.clone(), variant.clone());
            Ok(())
        }
        async fn query(&self, _query: &ProductQuery) -> CatalogResult<Vec<ProductVariant>> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }
        async fn find_by_id(&self, id: &str) -> CatalogResult<Option<ProductVariant>> {
            Ok(self.rows.lock().unwrap().get(id).cloned())
        }
        async fn list_for_classification(&self, _only: bool) -> CatalogResult<Vec<ClassificationCandidate>> {
            Ok(Vec::new())
        }
        async fn set_category(&self, _id: &str, _category: Category) -> CatalogResult<()> {
            Ok(())
        }
        async fn count(&self) -> CatalogResult<u64> {
            Ok(self.rows.lock().unwrap().len() as u64)
        }
    }

    fn catalog_html(cards: &[(&str, &str, &str)]) -> String {
        cards
            .iter()
            .map(|(name, path, price)| {
                format!(
                    r#"<div class="product-card__body">
                         <a class="product-card__link-overlay" href="{path}">{name}</a>
                         <div data-testid="product-card__price">{price}</div>
                       </div>"#
                )
            })
            .collect()
    }

    fn detail_html(style: &str) -> String {
        format!(
            r#"<li class="description-preview__color-description">Shown: White</li>
               <li class="description-preview__style-color">Style: {style}</li>"#
        )
    }

    fn profile() -> FetchProfile {
        FetchProfile {
            initial_wait: Duration::ZERO,
            settle: Duration::ZERO,
            max_iterations: 1,
        }
    }

    fn orchestrator(pages: Pages, repo: Arc<MemoryRepository>, settings: CrawlConfig) -> CrawlOrchestrator {
        let pages: Arc<dyn PageFetcher> = Arc::new(pages);
        let resolver = VariantResolver::new(
            Arc::clone(&pages),
            Arc::new(NoDocuments),
            DetailPageParser::new().unwrap(),
            profile(),
        );
        CrawlOrchestrator::new(
            pages,
            CardExtractor::new(CATALOG).unwrap(),
            resolver,
            repo,
            CATALOG,
            profile(),
            settings,
        )
    }

    fn standard_pages() -> HashMap<String, CatalogResult<String>> {
        HashMap::from([
            (
                CATALOG.to_string(),
                Ok(catalog_html(&[
                    ("Air Jordan 1 Low", "/t/aj1-low/AAA-100", "$95$190"),
                    ("Air Jordan 4 Retro", "/t/aj4/BBB-200", "free"),
                    ("Jordan Spizike", "/t/spizike/CCC-300", "$120"),
                    ("Jordan Max Aura", "/t/aura/DDD-400", "$100"),
                ])),
            ),
            ("https://shop.example/t/aj1-low/AAA-100".to_string(), Ok(detail_html("AAA-100"))),
            ("https://shop.example/t/aj4/BBB-200".to_string(), Ok(detail_html("BBB-200"))),
            ("https://shop.example/t/spizike/CCC-300".to_string(), Ok(detail_html("CCC-300"))),
            // DDD-400 detail page is missing: fetch timeout
        ])
    }

    #[tokio::test]
    async fn test_single_product_failures_do_not_end_the_run() {
        let repo = Arc::new(MemoryRepository::default());
        let crawler = orchestrator(
            Pages {
                pages: standard_pages(),
                converged: true,
            },
            repo.clone(),
            CrawlConfig::default(),
        );

        let summary = crawler.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.cards_seen, 4);
        assert_eq!(summary.variants_stored, 2);
        assert_eq!(summary.variants_rejected, 1);
        assert_eq!(summary.cards_skipped, 1);
        assert!(!summary.partial_catalog);
        assert!(summary.aborted.is_none());

        let stored = repo.find_by_id("AAA-100").await.unwrap().unwrap();
        assert_eq!(stored.name, "air jordan 1 low");
        assert_eq!(stored.current_price, 95.0);
        assert_eq!(stored.discount_percent, Some(50));
        assert_eq!(stored.colors.as_deref(), Some("white"));
        assert_eq!(stored.category, None);
        assert!(repo.find_by_id("BBB-200").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_failure_is_counted_not_fatal() {
        let repo = Arc::new(MemoryRepository {
            fail_ids: vec!["AAA-100".to_string()],
            ..MemoryRepository::default()
        });
        let crawler = orchestrator(
            Pages {
                pages: standard_pages(),
                converged: false,
            },
            repo.clone(),
            CrawlConfig {
                detail_concurrency: 3,
                max_cards: 0,
            },
        );

        let summary = crawler.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.store_failures, 1);
        assert_eq!(summary.variants_stored, 1);
        assert!(summary.partial_catalog);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_catalog_failure_ends_the_run() {
        let crawler = orchestrator(
            Pages {
                pages: HashMap::new(),
                converged: true,
            },
            Arc::new(MemoryRepository::default()),
            CrawlConfig::default(),
        );
        assert!(crawler.run(&CancellationToken::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_session_init_failure_stops_new_cards() {
        let mut pages = standard_pages();
        pages.insert(
            "https://shop.example/t/aj1-low/AAA-100".to_string(),
            Err(CatalogError::SessionInit {
                reason: "chromedriver gone".into(),
            }),
        );
        let repo = Arc::new(MemoryRepository::default());
        let crawler = orchestrator(
            Pages {
                pages,
                converged: true,
            },
            repo.clone(),
            CrawlConfig::default(),
        );

        let summary = crawler.run(&CancellationToken::new()).await.unwrap();
        assert!(summary.aborted.is_some());
        assert_eq!(summary.cards_not_started, 3);
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_run_starts_no_cards() {
        let repo = Arc::new(MemoryRepository::default());
        let crawler = orchestrator(
            Pages {
                pages: standard_pages(),
                converged: true,
            },
            repo.clone(),
            CrawlConfig::default(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = crawler.run(&cancel).await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.cards_not_started, 4);
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_max_cards_limits_the_crawl() {
        let repo = Arc::new(MemoryRepository::default());
        let crawler = orchestrator(
            Pages {
                pages: standard_pages(),
                converged: true,
            },
            repo.clone(),
            CrawlConfig {
                detail_concurrency: 1,
                max_cards: 1,
            },
        );

        let summary = crawler.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.cards_seen, 1);
        assert_eq!(summary.variants_stored, 1);
    }
}
