//! Product normalization into the canonical comparable form
//!
//! Deterministic and side-effect free: the same raw input always yields the
//! same canonical output. Unparseable prices mark a product non-matchable
//! rather than raising an error.

use rust_decimal::Decimal;

use crate::types::{CanonicalProduct, CatalogProduct, CompetitorProduct, RawListing};

/// Trailing marketing qualifiers stripped from titles before comparison.
/// Size/color qualifiers are deliberately kept; they matter for matching.
const MARKETING_SUFFIXES: &[&str] = &[
    "- new",
    "- sale",
    "- on sale",
    "- free shipping",
    "- open box",
    "- b stock",
    "- in stock",
];

/// Normalize a title: lowercase, strip marketing suffixes, strip punctuation,
/// collapse whitespace.
pub fn normalize_title(raw: &str) -> String {
    let mut title = raw.trim().to_lowercase();

    loop {
        let before = title.len();
        for suffix in MARKETING_SUFFIXES {
            if let Some(stripped) = title.strip_suffix(suffix) {
                title = stripped.trim_end().to_string();
            }
        }
        if title.len() == before {
            break;
        }
    }

    normalize_text(&title)
}

/// Normalize a vendor/brand name: lowercase, strip punctuation, collapse
/// whitespace.
pub fn normalize_vendor(raw: &str) -> String {
    normalize_text(&raw.trim().to_lowercase())
}

/// Lowercased input with punctuation replaced by spaces and whitespace
/// collapsed to single spaces.
fn normalize_text(input: &str) -> String {
    let replaced: String = input
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a scraped price string into a fixed-point decimal.
///
/// Accepts currency symbols and thousands separators ("$1,299.00"). Returns
/// None for missing, unparseable, or non-positive prices; the listing is then
/// excluded from candidate generation but kept in storage.
pub fn parse_price(text: &str) -> Option<Decimal> {
    let run: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    let run = run.trim_end_matches('.');
    if run.is_empty() {
        return None;
    }
    let price: Decimal = run.parse().ok()?;
    if price > Decimal::ZERO {
        Some(price)
    } else {
        None
    }
}

/// Canonical form of a merchant catalog product
pub fn canonicalize_catalog(product: &CatalogProduct) -> CanonicalProduct {
    CanonicalProduct {
        title: normalize_title(&product.title),
        vendor: non_empty(normalize_vendor(&product.vendor)),
        price: Some(product.price),
        product_type: non_empty(normalize_text(&product.product_type.to_lowercase())),
        sku: product.sku.as_ref().map(|s| s.trim().to_uppercase()),
    }
}

/// Canonical form of a raw scraped listing
pub fn canonicalize_listing(listing: &RawListing) -> CanonicalProduct {
    CanonicalProduct {
        title: normalize_title(&listing.title),
        vendor: listing
            .vendor
            .as_deref()
            .and_then(|v| non_empty(normalize_vendor(v))),
        price: listing.price_text.as_deref().and_then(parse_price),
        product_type: listing
            .product_type
            .as_deref()
            .and_then(|t| non_empty(normalize_text(&t.to_lowercase()))),
        sku: listing.sku.as_ref().map(|s| s.trim().to_uppercase()),
    }
}

/// Canonical form of a stored competitor product
pub fn canonicalize_competitor(product: &CompetitorProduct) -> CanonicalProduct {
    CanonicalProduct {
        title: normalize_title(&product.title),
        vendor: product
            .vendor
            .as_deref()
            .and_then(|v| non_empty(normalize_vendor(v))),
        price: product.price,
        product_type: product
            .product_type
            .as_deref()
            .and_then(|t| non_empty(normalize_text(&t.to_lowercase()))),
        sku: product.sku.as_ref().map(|s| s.trim().to_uppercase()),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
