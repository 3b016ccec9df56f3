//! Read-side filter object for the product store
//!
//! All filters are optional and combine conjunctively. Text terms are
//! case-folded here so they line up with the case-folded stored columns.

use serde::{Deserialize, Serialize};

use super::product::Category;

/// Default row cap used by the assistant-facing queries
pub const DEFAULT_QUERY_LIMIT: u32 = 20;

/// Restriction on promotion state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionFilter {
    #[default]
    Any,
    /// Only rows with a discount
    Discounted,
    /// Only rows labelled "Just In" or "Coming Soon"
    NewReleases,
    /// Discounted or new release
    PromotionPool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductQuery {
    pub name: Option<String>,
    pub max_price: Option<f64>,
    /// Any-of color terms
    pub colors: Vec<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub promotion: PromotionFilter,
    pub limit: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            name: None,
            max_price: None,
            colors: Vec::new(),
            description: None,
            category: None,
            promotion: PromotionFilter::Any,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl ProductQuery {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = fold_term(name);
        self
    }

    pub fn with_max_price(mut self, max_price: f64) -> Self {
        self.max_price = Some(max_price);
        self
    }

    /// Split a free-form color list ("red, black white") into terms
    pub fn with_colors(mut self, colors: &str) -> Self {
        self.colors = split_color_terms(colors);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = fold_term(description);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_promotion(mut self, promotion: PromotionFilter) -> Self {
        self.promotion = promotion;
        self
    }
}

fn fold_term(term: &str) -> Option<String> {
    let term = term.trim();
    (!term.is_empty()).then(|| term.to_lowercase())
}

pub fn split_color_terms(colors: &str) -> Vec<String> {
    colors
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter_map(fold_term)
        .collect()
}
