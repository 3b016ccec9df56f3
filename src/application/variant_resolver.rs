//! Variant resolution
//!
//! Expands one catalog card into every colorway its detail page offers.
//! The detail page is rendered with the short settle profile; each colorway
//! page is static and goes through the plain document fetcher. Colorways are
//! handled in an explicit loop and a failing colorway never takes the others
//! down with it.

#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::errors::{CatalogError, CatalogResult};
use crate::domain::product::{CatalogCard, ScrapedVariant};
use crate::domain::services::{DocumentFetcher, FetchProfile, PageFetcher};
use crate::infrastructure::parsing::{ColorwayDescriptor, DetailPage, DetailPageParser};

/// Variants read for one card
#[derive(Debug, Default)]
pub struct ResolvedCard {
    pub variants: Vec<ScrapedVariant>,
    /// Colorways that were listed but could not be fetched or read
    pub failed_colorways: usize,
}

/// Detail URL of a sibling colorway: the trailing path segment becomes the style code
pub fn colorway_url(detail_url: &str, style_code: &str) -> CatalogResult<String> {
    let mut url = Url::parse(detail_url)
        .map_err(|e| CatalogError::malformed_markup("detail url", &format!("{detail_url}: {e}")))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| CatalogError::malformed_markup("detail url path", detail_url))?;
        segments.pop_if_empty().pop().push(style_code);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

pub struct VariantResolver {
    page_fetcher: Arc<dyn PageFetcher>,
    document_fetcher: Arc<dyn DocumentFetcher>,
    parser: DetailPageParser,
    detail_profile: FetchProfile,
}

impl VariantResolver {
    pub fn new(
        page_fetcher: Arc<dyn PageFetcher>,
        document_fetcher: Arc<dyn DocumentFetcher>,
        parser: DetailPageParser,
        detail_profile: FetchProfile,
    ) -> Self {
        Self {
            page_fetcher,
            document_fetcher,
            parser,
            detail_profile,
        }
    }

    /// Every colorway of `card`, unnormalized.
    ///
    /// Fails only when the detail page itself cannot be fetched, or when a
    /// page without a colorway picker carries no style code.
    pub async fn resolve_variants(&self, card: &CatalogCard) -> CatalogResult<ResolvedCard> {
        let page = self
            .page_fetcher
            .fetch_rendered(&card.detail_url, self.detail_profile)
            .await?;
        let detail = self.parser.parse_detail(&page.html, &card.detail_url);

        if detail.colorways.is_empty() {
            let style_code = detail
                .style_code
                .clone()
                .ok_or_else(|| CatalogError::malformed_markup("style code", &card.detail_url))?;
            debug!("{} has a single colorway {}", card.name, style_code);

            return Ok(ResolvedCard {
                variants: vec![scraped(
                    card,
                    &detail,
                    style_code,
                    detail.shown_colors.clone(),
                    card.detail_url.clone(),
                    card.hero_image_url.clone(),
                )],
                failed_colorways: 0,
            });
        }

        let mut resolved = ResolvedCard::default();
        for descriptor in &detail.colorways {
            match self.resolve_colorway(card, &detail, descriptor).await {
                Ok(variant) => resolved.variants.push(variant),
                Err(e) => {
                    warn!(
                        name = %card.name,
                        style = %descriptor.style_code,
                        "Skipping colorway: {}",
                        e
                    );
                    resolved.failed_colorways += 1;
                }
            }
        }

        info!(
            "Resolved {} of {} colorways for {}",
            resolved.variants.len(),
            detail.colorways.len(),
            card.name
        );
        Ok(resolved)
    }

    async fn resolve_colorway(
        &self,
        card: &CatalogCard,
        detail: &DetailPage,
        descriptor: &ColorwayDescriptor,
    ) -> CatalogResult<ScrapedVariant> {
        let url = colorway_url(&card.detail_url, &descriptor.style_code)?;

        // The colorway already on screen needs no second request
        let colors = if detail.style_code.as_deref() == Some(descriptor.style_code.as_str()) {
            detail.shown_colors.clone()
        } else {
            let html = self.document_fetcher.fetch_document(&url).await?;
            self.parser.parse_shown_colors(&html, &url)
        };

        Ok(scraped(
            card,
            detail,
            descriptor.style_code.clone(),
            colors,
            url,
            descriptor.image_url.clone(),
        ))
    }
}

fn scraped(
    card: &CatalogCard,
    detail: &DetailPage,
    id: String,
    colors: Option<String>,
    source_url: String,
    image_url: Option<String>,
) -> ScrapedVariant {
    ScrapedVariant {
        id,
        name: card.name.clone(),
        promotion_status: card.promotion_status.clone(),
        price_text: card.price_text.clone(),
        colors,
        source_url,
        image_url,
        description: detail.description.clone(),
    }
}
