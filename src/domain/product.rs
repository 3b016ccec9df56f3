use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Promotion labels that place a variant in the new-release pool
pub const NEW_RELEASE_STATUSES: [&str; 2] = ["Just In", "Coming Soon"];

/// Fixed product taxonomy written back by the classification pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Low,
    Mid,
    High,
    Basketball,
    Slides,
}

impl Category {
    /// Keyword precedence used when matching product names
    pub const ALL: [Category; 5] = [
        Category::Low,
        Category::Mid,
        Category::High,
        Category::Basketball,
        Category::Slides,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Low => "low",
            Category::Mid => "mid",
            Category::High => "high",
            Category::Basketball => "basketball",
            Category::Slides => "slides",
        }
    }

    /// Category tokens handed to the image classifier
    pub fn vocabulary() -> Vec<&'static str> {
        Self::ALL.iter().map(Category::as_str).collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Exact token match after trimming and lowercasing; synonyms are rejected
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == token)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// Catalog listing tile, consumed by the variant resolver and then dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCard {
    pub name: String,
    pub detail_url: String,
    pub promotion_status: Option<String>,
    pub price_text: Option<String>,
    pub hero_image_url: Option<String>,
}

/// One colorway as read off the detail pages, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedVariant {
    pub id: String,
    pub name: String,
    pub promotion_status: Option<String>,
    pub price_text: Option<String>,
    pub colors: Option<String>,
    pub source_url: String,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

/// Canonical persisted record for one physical colorway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    /// Style/color code, e.g. `DZ5485-612`
    pub id: String,
    pub name: String,
    pub category: Option<Category>,
    pub promotion_status: Option<String>,
    pub current_price: f64,
    pub discount_percent: Option<u8>,
    pub colors: Option<String>,
    pub source_url: String,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

impl ProductVariant {
    /// Discounted, or flagged as a new or upcoming release
    pub fn in_promotion_pool(&self) -> bool {
        self.discount_percent.is_some()
            || self
                .promotion_status
                .as_deref()
                .is_some_and(|status| NEW_RELEASE_STATUSES.contains(&status))
    }
}
