//! Catalog listing parser
//!
//! Turns the rendered catalog page into [`CatalogCard`] summaries.

#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::config::SelectorConfig;
use super::{compile_selectors, element_text, resolve_url, select_first};
use crate::domain::product::CatalogCard;

pub struct CardExtractor {
    container_selectors: Vec<Selector>,
    link_selectors: Vec<Selector>,
    messaging_selectors: Vec<Selector>,
    price_selectors: Vec<Selector>,
    hero_image_selectors: Vec<Selector>,
    base_url: Option<Url>,
}

impl CardExtractor {
    /// Extractor with the default storefront selectors
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(&SelectorConfig::default(), base_url)
    }

    pub fn with_config(selectors: &SelectorConfig, base_url: &str) -> Result<Self> {
        Ok(Self {
            container_selectors: compile_selectors("card container", &selectors.card_container)?,
            link_selectors: compile_selectors("card link", &selectors.card_link)?,
            messaging_selectors: compile_selectors("card messaging", &selectors.card_messaging)?,
            price_selectors: compile_selectors("card price", &selectors.card_price)?,
            hero_image_selectors: compile_selectors("card hero image", &selectors.card_hero_image)?,
            base_url: Url::parse(base_url).ok(),
        })
    }

    /// Every card on the page, in document order.
    ///
    /// Cards missing a name or a detail link are logged and skipped.
    pub fn extract_cards(&self, html: &str) -> Vec<CatalogCard> {
        let document = Html::parse_document(html);

        // The first container selector that matches anything wins
        let Some(elements) = self.container_selectors.iter().find_map(|selector| {
            let found: Vec<_> = document.select(selector).collect();
            (!found.is_empty()).then_some(found)
        }) else {
            warn!("No product cards found on catalog page");
            return Vec::new();
        };

        let mut cards = Vec::with_capacity(elements.len());
        for (index, element) in elements.into_iter().enumerate() {
            let link = select_first(element, &self.link_selectors);

            let name = link.and_then(element_text);
            let detail_url = link
                .and_then(|link| link.value().attr("href"))
                .and_then(|href| resolve_url(href, self.base_url.as_ref()));

            let (Some(name), Some(detail_url)) = (name, detail_url) else {
                warn!("Skipping card {}: missing product name or detail link", index);
                continue;
            };

            let promotion_status = select_first(element, &self.messaging_selectors).and_then(element_text);
            let price_text = select_first(element, &self.price_selectors).and_then(element_text);
            let hero_image_url = select_first(element, &self.hero_image_selectors)
                .and_then(|img| img.value().attr("src"))
                .and_then(|src| resolve_url(src, self.base_url.as_ref()));

            cards.push(CatalogCard {
                name,
                detail_url,
                promotion_status,
                price_text,
                hero_image_url,
            });
        }

        debug!("Extracted {} product cards", cards.len());
        cards
    }
}
