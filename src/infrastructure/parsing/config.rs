//! Selector configuration for catalog and detail page extraction
//!
//! Every selector is a list of fallbacks tried in order, so a markup change on
//! the storefront can be patched from the config file without a rebuild.

use serde::{Deserialize, Serialize};

/// CSS selectors and literal labels used by the card extractor and detail parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Product card body on the catalog page
    pub card_container: Vec<String>,

    /// Primary link inside a card; its text is the product name
    pub card_link: Vec<String>,

    /// Optional promotion messaging ("Just In", "Sustainable Materials", ...)
    pub card_messaging: Vec<String>,

    pub card_price: Vec<String>,

    pub card_hero_image: Vec<String>,

    /// First paragraph of the description preview on a detail page
    pub description: Vec<String>,

    /// List item carrying the "Shown:" colorway text
    pub shown_colors: Vec<String>,
    pub shown_label: String,

    /// List item carrying the "Style:" code
    pub style_code: Vec<String>,
    pub style_label: String,

    /// Colorway picker block and its per-color containers
    pub colorway_picker: Vec<String>,
    pub colorway_container: Vec<String>,
    pub colorway_input: Vec<String>,

    /// Attribute on the colorway input that holds the style code
    pub colorway_style_attribute: String,

    pub colorway_image: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            // `div.product-card` wraps `div.product-card__body`. Only the first
            // selector that matches anything is used, so keep the inner one first.
            card_container: strings(&["div.product-card__body", "div.product-card"]),
            card_link: strings(&["a.product-card__link-overlay", "a.product-card__img-link-overlay"]),
            card_messaging: strings(&[r#"div[data-testid="product-card__messaging"]"#, "div.product-card__messaging"]),
            card_price: strings(&[r#"div[data-testid="product-card__price"]"#, "div.product-price"]),
            card_hero_image: strings(&[r#"img[class^="product-card__hero-image"]"#]),
            description: strings(&[r#"div[class^="description-preview"] p"#]),
            shown_colors: strings(&["li.description-preview__color-description"]),
            shown_label: "Shown:".to_string(),
            style_code: strings(&["li.description-preview__style-color"]),
            style_label: "Style:".to_string(),
            colorway_picker: strings(&["div#ColorwayDiv"]),
            colorway_container: strings(&[r#"div[class*="colorway-container"]"#]),
            colorway_input: strings(&[r#"input[name="pdp-colorpicker"]"#]),
            colorway_style_attribute: "data-style-color".to_string(),
            colorway_image: strings(&["img"]),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}
