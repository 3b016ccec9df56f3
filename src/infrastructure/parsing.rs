//! HTML parsing for catalog listings and product detail pages
//!
//! Selectors come from [`SelectorConfig`] and are compiled once per parser.
//! Optional elements that are missing degrade to `None`; only a card without
//! a name or link is dropped.

pub mod card_extractor;
pub mod config;
pub mod detail_parser;

pub use card_extractor::CardExtractor;
pub use config::SelectorConfig;
pub use detail_parser::{ColorwayDescriptor, DetailPage, DetailPageParser};

use anyhow::{Result, anyhow};
use scraper::{ElementRef, Selector};
use tracing::warn;
use url::Url;

/// Compile a fallback list; a list with no valid selector is a configuration error
pub(crate) fn compile_selectors(name: &str, selector_strings: &[String]) -> Result<Vec<Selector>> {
    let mut selectors = Vec::new();
    let mut errors = Vec::new();

    for selector_str in selector_strings {
        match Selector::parse(selector_str) {
            Ok(selector) => selectors.push(selector),
            Err(e) => {
                warn!("Failed to compile {} selector '{}': {}", name, selector_str, e);
                errors.push(format!("'{selector_str}': {e}"));
            }
        }
    }

    if selectors.is_empty() {
        return Err(anyhow!(
            "No valid selector for {}. Errors: {}",
            name,
            errors.join(", ")
        ));
    }

    Ok(selectors)
}

/// First element matched by any selector, in fallback order
pub(crate) fn select_first<'a>(scope: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .find_map(|selector| scope.select(selector).next())
}

/// Trimmed text content; blank text counts as absent
pub(crate) fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Resolve `href` against `base`, leaving absolute URLs alone
pub(crate) fn resolve_url(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.and_then(|base| base.join(href).ok()).map(|url| url.to_string()),
    }
}
