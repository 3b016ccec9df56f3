//! Product detail page parser
//!
//! Reads the description, the labelled "Shown:" and "Style:" list items and
//! the colorway picker. Each field is optional; a missing element or label is
//! logged at debug level and the field is left empty.

#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::config::SelectorConfig;
use super::{compile_selectors, element_text, resolve_url, select_first};
use crate::domain::errors::CatalogError;

/// One entry of the colorway picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorwayDescriptor {
    pub style_code: String,
    pub image_url: Option<String>,
}

/// Fields read from a rendered detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailPage {
    pub description: Option<String>,
    pub shown_colors: Option<String>,
    pub style_code: Option<String>,
    /// Empty when the page has no picker (single-colorway product)
    pub colorways: Vec<ColorwayDescriptor>,
}

pub struct DetailPageParser {
    description_selectors: Vec<Selector>,
    shown_selectors: Vec<Selector>,
    style_selectors: Vec<Selector>,
    picker_selectors: Vec<Selector>,
    container_selectors: Vec<Selector>,
    input_selectors: Vec<Selector>,
    image_selectors: Vec<Selector>,
    shown_label: String,
    style_label: String,
    style_attribute: String,
}

impl DetailPageParser {
    pub fn new() -> Result<Self> {
        Self::with_config(&SelectorConfig::default())
    }

    pub fn with_config(selectors: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            description_selectors: compile_selectors("description", &selectors.description)?,
            shown_selectors: compile_selectors("shown colors", &selectors.shown_colors)?,
            style_selectors: compile_selectors("style code", &selectors.style_code)?,
            picker_selectors: compile_selectors("colorway picker", &selectors.colorway_picker)?,
            container_selectors: compile_selectors("colorway container", &selectors.colorway_container)?,
            input_selectors: compile_selectors("colorway input", &selectors.colorway_input)?,
            image_selectors: compile_selectors("colorway image", &selectors.colorway_image)?,
            shown_label: selectors.shown_label.clone(),
            style_label: selectors.style_label.clone(),
            style_attribute: selectors.colorway_style_attribute.clone(),
        })
    }

    /// Parse a detail page rendered from `page_url`
    pub fn parse_detail(&self, html: &str, page_url: &str) -> DetailPage {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let base = Url::parse(page_url).ok();

        let description = select_first(root, &self.description_selectors).and_then(element_text);
        if description.is_none() {
            debug!("{}", CatalogError::malformed_markup("description", page_url));
        }

        DetailPage {
            description,
            shown_colors: self.labelled_value(root, &self.shown_selectors, &self.shown_label, page_url),
            style_code: self.labelled_value(root, &self.style_selectors, &self.style_label, page_url),
            colorways: self.colorways(root, base.as_ref(), page_url),
        }
    }

    /// Only the "Shown:" text, used for plain colorway documents
    pub fn parse_shown_colors(&self, html: &str, page_url: &str) -> Option<String> {
        let document = Html::parse_document(html);
        self.labelled_value(document.root_element(), &self.shown_selectors, &self.shown_label, page_url)
    }

    fn labelled_value(
        &self,
        root: ElementRef<'_>,
        selectors: &[Selector],
        label: &str,
        page_url: &str,
    ) -> Option<String> {
        let Some(text) = select_first(root, selectors).and_then(element_text) else {
            debug!("{}", CatalogError::malformed_markup(label, page_url));
            return None;
        };
        value_after_label(&text, label)
    }

    fn colorways(&self, root: ElementRef<'_>, base: Option<&Url>, page_url: &str) -> Vec<ColorwayDescriptor> {
        let Some(picker) = select_first(root, &self.picker_selectors) else {
            return Vec::new();
        };

        let containers: Vec<ElementRef<'_>> = self
            .container_selectors
            .iter()
            .find_map(|selector| {
                let found: Vec<_> = picker.select(selector).collect();
                (!found.is_empty()).then_some(found)
            })
            .unwrap_or_default();

        let mut colorways: Vec<ColorwayDescriptor> = Vec::with_capacity(containers.len());
        for container in containers {
            let style_code = select_first(container, &self.input_selectors)
                .and_then(|input| input.value().attr(&self.style_attribute))
                .map(str::trim)
                .filter(|code| !code.is_empty());

            let Some(style_code) = style_code else {
                warn!("Colorway without {} on {}", self.style_attribute, page_url);
                continue;
            };
            if colorways.iter().any(|c| c.style_code == style_code) {
                continue;
            }

            let image_url = select_first(container, &self.image_selectors)
                .and_then(|img| img.value().attr("src"))
                .and_then(|src| resolve_url(src, base));

            colorways.push(ColorwayDescriptor {
                style_code: style_code.to_string(),
                image_url,
            });
        }

        debug!("Found {} colorways on {}", colorways.len(), page_url);
        colorways
    }
}

/// Text after the first occurrence of `label`, trimmed
pub fn value_after_label(text: &str, label: &str) -> Option<String> {
    let (_, value) = text.split_once(label)?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
