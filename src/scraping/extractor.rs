//! Listing extraction from fetched storefront pages
//!
//! Understands the JSON shapes Shopify-style storefronts expose
//! (`/products.json`, `/collections/{handle}/products.json`, the search
//! suggest endpoint) and falls back to anchor scanning for plain HTML pages.
//! Extraction never fails a scrape: a page that yields nothing is just an
//! empty result.

use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

use super::fetcher::FetchedPage;
use crate::types::RawListing;

/// Extract product listings from a fetched page.
///
/// `base` is the competitor's site root, used to absolutize listing URLs.
pub fn extract_listings(page: &FetchedPage, base: &Url) -> Vec<RawListing> {
    if page.is_json() {
        if let Ok(value) = serde_json::from_str::<Value>(&page.body) {
            if let Some(products) = value.get("products").and_then(Value::as_array) {
                return parse_product_objects(products, base);
            }
            if let Some(products) = value
                .pointer("/resources/results/products")
                .and_then(Value::as_array)
            {
                return parse_product_objects(products, base);
            }
        }
        return Vec::new();
    }

    extract_from_html(&page.body, base)
}

/// Parse an array of product objects from either the catalog or the search
/// suggest shape.
fn parse_product_objects(products: &[Value], base: &Url) -> Vec<RawListing> {
    let mut seen = HashSet::new();
    let mut listings = Vec::new();

    for product in products {
        let title = match product.get("title").and_then(Value::as_str) {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => continue,
        };

        let url = product
            .get("url")
            .and_then(Value::as_str)
            .map(|u| u.to_string())
            .or_else(|| {
                product
                    .get("handle")
                    .and_then(Value::as_str)
                    .map(|h| format!("/products/{}", h))
            });
        let Some(url) = url.and_then(|u| base.join(&u).ok()) else {
            continue;
        };
        let url = url.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }

        let first_variant = product
            .get("variants")
            .and_then(Value::as_array)
            .and_then(|v| v.first());

        let price_text = product
            .get("price")
            .or_else(|| first_variant.and_then(|v| v.get("price")))
            .and_then(value_to_price_text);

        let sku = first_variant
            .and_then(|v| v.get("sku"))
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        listings.push(RawListing {
            title,
            vendor: product
                .get("vendor")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            price_text,
            sku,
            product_type: product
                .get("product_type")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            tags: parse_tags(product.get("tags")),
            url,
        });
    }

    listings
}

/// Shopify serializes prices as strings in catalog JSON and sometimes as
/// numbers (or cents) elsewhere.
fn value_to_price_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Tags arrive as an array of strings or a single comma-joined string.
fn parse_tags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Fallback for plain HTML listing pages: collect product anchors. Prices
/// are rarely recoverable reliably this way, so listings come back without
/// one and stay non-matchable until a JSON source supplies a price.
fn extract_from_html(body: &str, base: &Url) -> Vec<RawListing> {
    let document = Html::parse_document(body);
    let selector = match Selector::parse(r#"a[href*="/products/"]"#) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut seen = HashSet::new();
    let mut listings = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(url) = base.join(href) else {
            continue;
        };
        let mut url = url;
        url.set_fragment(None);
        let url = url.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }

        let title = element.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }

        listings.push(RawListing {
            title,
            vendor: None,
            price_text: None,
            sku: None,
            product_type: None,
            tags: Vec::new(),
            url,
        });
    }

    listings
}
