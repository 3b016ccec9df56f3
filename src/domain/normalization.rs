//! Field normalizer
//!
//! Turns the loosely structured text scraped from product pages into the
//! canonical values stored for each variant. Prices are handled in integer
//! cents so the discount floor is exact.

use lazy_static::lazy_static;
use regex::Regex;

use super::errors::{CatalogError, CatalogResult};
use super::product::{ProductVariant, ScrapedVariant};

lazy_static! {
    static ref DOLLAR_TOKEN: Regex =
        Regex::new(r"\$\s*([0-9][0-9,]*(?:\.[0-9]+)?)").expect("valid price regex");
}

/// Normalized price of a variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceInfo {
    pub current_cents: i64,
    pub discount_percent: Option<u8>,
}

impl PriceInfo {
    pub fn current_price(&self) -> f64 {
        self.current_cents as f64 / 100.0
    }
}

/// Parse a price string such as `"$95$190"` or `"$120"`.
///
/// Two dollar amounts mean (sale, original); one means no discount.
pub fn normalize_price(text: &str) -> CatalogResult<PriceInfo> {
    let amounts = DOLLAR_TOKEN
        .captures_iter(text)
        .map(|caps| parse_cents(&caps[1]).ok_or_else(|| CatalogError::invalid_price(text)))
        .collect::<CatalogResult<Vec<i64>>>()?;

    match amounts.as_slice() {
        [current] => Ok(PriceInfo {
            current_cents: *current,
            discount_percent: None,
        }),
        [current, original] => {
            if *original <= 0 || current > original {
                return Err(CatalogError::invalid_price(text));
            }
            // Both operands are non-negative, so integer division is floor
            let discount = (original - current)
                .checked_mul(100)
                .map(|scaled| scaled / original)
                .and_then(|discount| u8::try_from(discount).ok())
                .ok_or_else(|| CatalogError::invalid_price(text))?;
            Ok(PriceInfo {
                current_cents: *current,
                discount_percent: Some(discount),
            })
        }
        _ => Err(CatalogError::invalid_price(text)),
    }
}

fn parse_cents(token: &str) -> Option<i64> {
    let cleaned = token.replace(',', "");
    let (whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (cleaned.as_str(), ""),
    };
    let whole: i64 = whole.parse().ok()?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        // Sub-cent digits are truncated
        _ => fraction[..2].parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(fraction)
}

/// Case-fold and trim free text; blank input becomes absent
pub fn normalize_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Build the persisted record for one scraped colorway.
///
/// The category is left unset; only the classification pass writes it.
pub fn normalize_variant(scraped: ScrapedVariant) -> CatalogResult<ProductVariant> {
    let price_text = scraped
        .price_text
        .as_deref()
        .ok_or_else(|| CatalogError::invalid_price(""))?;
    let price = normalize_price(price_text)?;

    Ok(ProductVariant {
        id: scraped.id.trim().to_string(),
        name: scraped.name.trim().to_lowercase(),
        category: None,
        promotion_status: scraped
            .promotion_status
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        current_price: price.current_price(),
        discount_percent: price.discount_percent,
        colors: normalize_text(scraped.colors.as_deref()),
        source_url: scraped.source_url,
        image_url: scraped.image_url,
        description: normalize_text(scraped.description.as_deref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("$95$190", 9500, Some(50))]
    #[case("$120", 12000, None)]
    #[case("$150$150", 15000, Some(0))]
    #[case("$0$190", 0, Some(100))]
    #[case("$89.97$130", 8997, Some(30))]
    #[case("Sale $1,299.50 was $1,500", 129_950, Some(13))]
    #[case("$ 64.5", 6450, None)]
    fn test_normalize_price(#[case] text: &str, #[case] cents: i64, #[case] discount: Option<u8>) {
        let price = normalize_price(text).unwrap();
        assert_eq!(price.current_cents, cents);
        assert_eq!(price.discount_percent, discount);
    }

    #[rstest]
    #[case("")]
    #[case("Free")]
    #[case("$")]
    #[case("$200$100")]
    #[case("$10$0")]
    #[case("$1$2$3")]
    #[case("$0$1000000000000000")]
    #[case("$1$92233720368547758")]
    fn test_invalid_price_text(#[case] text: &str) {
        assert_eq!(
            normalize_price(text),
            Err(CatalogError::InvalidPriceFormat { text: text.to_string() })
        );
    }

    #[test]
    fn test_scenario_prices() {
        let sale = normalize_price("$95$190").unwrap();
        assert!((sale.current_price() - 95.0).abs() < f64::EPSILON);
        assert_eq!(sale.discount_percent, Some(50));

        let full = normalize_price("$120").unwrap();
        assert!((full.current_price() - 120.0).abs() < f64::EPSILON);
        assert_eq!(full.discount_percent, None);
    }

    #[test]
    fn test_normalize_variant_case_folds_text() {
        let scraped = ScrapedVariant {
            id: " DZ5485-612 ".into(),
            name: "Air Jordan 1 Low OG".into(),
            promotion_status: Some("Just In".into()),
            price_text: Some("$140".into()),
            colors: Some("Varsity Red/White/Black".into()),
            source_url: "https://example.com/t/air-jordan-1-low-og/DZ5485-612".into(),
            image_url: Some("https://img.example.com/1.png".into()),
            description: Some("  Inspired by the ORIGINAL. ".into()),
        };
        let variant = normalize_variant(scraped).unwrap();
        assert_eq!(variant.id, "DZ5485-612");
        assert_eq!(variant.name, "air jordan 1 low og");
        assert_eq!(variant.colors.as_deref(), Some("varsity red/white/black"));
        assert_eq!(variant.description.as_deref(), Some("inspired by the original."));
        assert_eq!(variant.promotion_status.as_deref(), Some("Just In"));
        assert_eq!(variant.category, None);
    }

    #[test]
    fn test_normalize_variant_requires_price() {
        let scraped = ScrapedVariant {
            id: "X".into(),
            name: "n".into(),
            promotion_status: None,
            price_text: None,
            colors: None,
            source_url: "u".into(),
            image_url: None,
            description: Some("   ".into()),
        };
        assert!(matches!(
            normalize_variant(scraped),
            Err(CatalogError::InvalidPriceFormat { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_single_token_has_no_discount(dollars in 0u32..100_000) {
            let price = normalize_price(&format!("${dollars}")).unwrap();
            prop_assert_eq!(price.current_cents, i64::from(dollars) * 100);
            prop_assert_eq!(price.discount_percent, None);
        }

        #[test]
        fn prop_two_tokens_floor_discount(original in 1u32..10_000, ratio in 0.0f64..=1.0) {
            let current = (f64::from(original) * ratio).floor() as u32;
            let price = normalize_price(&format!("${current}${original}")).unwrap();
            let expected = (u64::from(original - current) * 100 / u64::from(original)) as u8;
            prop_assert_eq!(price.current_cents, i64::from(current) * 100);
            prop_assert_eq!(price.discount_percent, Some(expected));
            prop_assert!(expected <= 100);
        }
    }
}
