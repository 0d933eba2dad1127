//! Hybrid match scoring
//!
//! Combines a title-similarity component with a weighted attribute score
//! (brand, title-token overlap, price proximity, product-type agreement) and
//! buckets the result into a confidence tier. The factor weights and tier
//! thresholds are configuration, not constants; the shipped defaults are the
//! calibration the tests pin down.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::MatchingConfig;
use crate::types::{CanonicalProduct, Confidence};

use super::similarity::{token_jaccard, LexicalSimilarity, TitleSimilarity};

/// Lookup capability for the pair blacklist.
///
/// Injected rather than hard-wired so the scoring engine can be exercised
/// with an in-memory blacklist in tests.
pub trait BlacklistLookup: Send + Sync {
    fn is_blacklisted(&self, catalog_product_id: &str, competitor_product_id: &str) -> bool;
}

/// Per-factor breakdown of a scored pair
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub overall: f64,
    pub title_similarity: f64,
    pub attribute_score: f64,
    pub brand: f64,
    pub title_overlap: f64,
    pub price_proximity: f64,
    pub type_agreement: f64,
}

/// Scores one canonical catalog product against one canonical competitor
/// listing
pub struct MatchScorer {
    config: MatchingConfig,
    similarity: Arc<dyn TitleSimilarity>,
}

impl MatchScorer {
    /// Scorer with the default lexical title similarity
    pub fn new(config: MatchingConfig) -> Self {
        Self::with_similarity(config, Arc::new(LexicalSimilarity::default()))
    }

    /// Scorer with an injected title-similarity implementation
    pub fn with_similarity(config: MatchingConfig, similarity: Arc<dyn TitleSimilarity>) -> Self {
        Self { config, similarity }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Compute the hybrid score for a pair of canonical products.
    pub fn score(&self, catalog: &CanonicalProduct, listing: &CanonicalProduct) -> ScoreBreakdown {
        let title_similarity = self.similarity.similarity(&catalog.title, &listing.title);

        let brand = self.brand_score(catalog.vendor.as_deref(), listing.vendor.as_deref());
        let title_overlap = token_jaccard(&catalog.title, &listing.title);
        let price_proximity = self.price_proximity(catalog.price, listing.price);
        let type_agreement =
            type_agreement(catalog.product_type.as_deref(), listing.product_type.as_deref());

        let w = &self.config.weights;
        let attribute_score = w.brand * brand
            + w.title_overlap * title_overlap
            + w.price * price_proximity
            + w.product_type * type_agreement;

        let tw = self.config.title_weight;
        let overall = (tw * title_similarity + (1.0 - tw) * attribute_score).clamp(0.0, 1.0);

        ScoreBreakdown {
            overall,
            title_similarity,
            attribute_score,
            brand,
            title_overlap,
            price_proximity,
            type_agreement,
        }
    }

    /// Bucket an overall score into a confidence tier.
    pub fn confidence(&self, overall: f64) -> Confidence {
        let t = &self.config.thresholds;
        if overall >= t.high {
            Confidence::High
        } else if overall >= t.medium {
            Confidence::Medium
        } else if overall >= t.low {
            Confidence::Low
        } else {
            Confidence::Reject
        }
    }

    /// Cheap pre-filter run before the full scoring step.
    ///
    /// Candidate generation is O(N×M); pairs with wildly different prices or
    /// no lexical connection at all are dropped here without paying for the
    /// similarity computation.
    pub fn plausible_pair(&self, catalog: &CanonicalProduct, listing: &CanonicalProduct) -> bool {
        let (Some(a), Some(b)) = (catalog.price, listing.price) else {
            return false;
        };
        // Prices more than ~4x apart are never the same product
        if price_difference_ratio(a, b) > 0.75 {
            return false;
        }
        let same_vendor = match (&catalog.vendor, &listing.vendor) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        same_vendor || shares_token(&catalog.title, &listing.title)
    }

    /// Brand factor: exact match scores 1.0, a fuzzy match above the
    /// configured floor scores its Jaro-Winkler value, a clear mismatch
    /// scores 0.0. A missing vendor is unknown rather than a mismatch and
    /// scores a neutral 0.5.
    fn brand_score(&self, catalog: Option<&str>, listing: Option<&str>) -> f64 {
        match (catalog, listing) {
            (Some(a), Some(b)) => {
                if a == b {
                    1.0
                } else {
                    let jw = strsim::jaro_winkler(a, b);
                    if jw >= self.config.min_brand_similarity {
                        jw
                    } else {
                        0.0
                    }
                }
            }
            _ => 0.5,
        }
    }

    /// Price factor: 1.0 for equal prices, decaying linearly to 0.5 at the
    /// edge of the tolerance band, then with diminishing returns down to 0.0
    /// as prices approach 100% apart.
    fn price_proximity(&self, catalog: Option<Decimal>, listing: Option<Decimal>) -> f64 {
        let (Some(a), Some(b)) = (catalog, listing) else {
            return 0.0;
        };
        let ratio = price_difference_ratio(a, b);
        let band = self.config.price_tolerance;
        if ratio <= band {
            1.0 - 0.5 * (ratio / band)
        } else {
            let tail = ((ratio - band) / (1.0 - band)).min(1.0);
            0.5 * (1.0 - tail)
        }
    }
}

/// |a - b| / max(a, b), in f64 for scoring purposes
fn price_difference_ratio(a: Decimal, b: Decimal) -> f64 {
    let hi = a.max(b).to_f64().unwrap_or(0.0);
    let lo = a.min(b).to_f64().unwrap_or(0.0);
    if hi <= 0.0 {
        return 1.0;
    }
    (hi - lo) / hi
}

/// Type factor: equal types score 1.0, differing types score their token
/// overlap, a missing type is neutral.
fn type_agreement(catalog: Option<&str>, listing: Option<&str>) -> f64 {
    match (catalog, listing) {
        (Some(a), Some(b)) => {
            if a == b {
                1.0
            } else {
                token_jaccard(a, b)
            }
        }
        _ => 0.5,
    }
}

fn shares_token(a: &str, b: &str) -> bool {
    a.split_whitespace()
        .any(|token| b.split_whitespace().any(|other| other == token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn scorer() -> MatchScorer {
        MatchScorer::new(MatchingConfig::default())
    }

    fn canonical(
        title: &str,
        vendor: Option<&str>,
        price: Option<&str>,
        product_type: Option<&str>,
    ) -> CanonicalProduct {
        CanonicalProduct {
            title: title.to_string(),
            vendor: vendor.map(|s| s.to_string()),
            price: price.map(dec),
            product_type: product_type.map(|s| s.to_string()),
            sku: None,
        }
    }

    #[test]
    fn identical_products_score_high() {
        let a = canonical(
            "ecm synchronika",
            Some("ecm"),
            Some("3199.00"),
            Some("espresso machines"),
        );
        let breakdown = scorer().score(&a, &a);
        assert!((breakdown.overall - 1.0).abs() < 1e-9, "got {:?}", breakdown);
        assert_eq!(scorer().confidence(breakdown.overall), Confidence::High);
    }

    #[test]
    fn same_product_sparse_listing_still_high() {
        // Scraped listings often lack vendor and type; an exact title and
        // price must still clear the high bar.
        let catalog = canonical(
            "ecm synchronika",
            Some("ecm"),
            Some("3199.00"),
            Some("espresso machines"),
        );
        let listing = canonical("ecm synchronika", None, Some("3199.00"), None);
        let breakdown = scorer().score(&catalog, &listing);
        assert!(breakdown.overall >= 0.80, "got {:?}", breakdown);
    }

    #[test]
    fn unrelated_products_are_rejected() {
        let catalog = canonical(
            "ecm synchronika",
            Some("ecm"),
            Some("3199.00"),
            Some("espresso machines"),
        );
        let listing = canonical(
            "baratza encore conical burr grinder",
            Some("baratza"),
            Some("169.00"),
            Some("grinders"),
        );
        let breakdown = scorer().score(&catalog, &listing);
        assert_eq!(scorer().confidence(breakdown.overall), Confidence::Reject);
    }

    #[test]
    fn confidence_tier_boundaries() {
        let s = scorer();
        assert_eq!(s.confidence(0.80), Confidence::High);
        assert_eq!(s.confidence(0.79), Confidence::Medium);
        assert_eq!(s.confidence(0.70), Confidence::Medium);
        assert_eq!(s.confidence(0.69), Confidence::Low);
        assert_eq!(s.confidence(0.60), Confidence::Low);
        assert_eq!(s.confidence(0.59), Confidence::Reject);
    }

    #[test]
    fn price_proximity_decays_with_distance() {
        let s = scorer();
        let base = canonical("widget", None, Some("100.00"), None);

        let equal = canonical("widget", None, Some("100.00"), None);
        let close = canonical("widget", None, Some("90.00"), None);
        let far = canonical("widget", None, Some("50.00"), None);

        let p_equal = s.score(&base, &equal).price_proximity;
        let p_close = s.score(&base, &close).price_proximity;
        let p_far = s.score(&base, &far).price_proximity;

        assert!((p_equal - 1.0).abs() < 1e-9);
        assert!(p_close < p_equal && p_close > p_far, "{} {} {}", p_close, p_equal, p_far);
        assert!(p_far < 0.5);
    }

    #[test]
    fn fuzzy_brand_match_counts_above_floor() {
        let s = scorer();
        let a = canonical("widget", Some("lamarzocco"), Some("100.00"), None);
        let b = canonical("widget", Some("la marzocco"), Some("100.00"), None);
        let breakdown = s.score(&a, &b);
        assert!(breakdown.brand > 0.85, "got {:?}", breakdown);

        let c = canonical("widget", Some("rocket"), Some("100.00"), None);
        assert_eq!(s.score(&a, &c).brand, 0.0);
    }

    #[test]
    fn missing_vendor_is_neutral() {
        let s = scorer();
        let a = canonical("widget", Some("ecm"), Some("100.00"), None);
        let b = canonical("widget", None, Some("100.00"), None);
        assert!((s.score(&a, &b).brand - 0.5).abs() < 1e-9);
    }

    #[test]
    fn scoring_is_deterministic() {
        let s = scorer();
        let a = canonical("ecm synchronika", Some("ecm"), Some("3199.00"), None);
        let b = canonical("ecm synchronika espresso machine", None, Some("2999.00"), None);
        assert_eq!(s.score(&a, &b), s.score(&a, &b));
    }

    // ========================================================================
    // plausible_pair pruning
    // ========================================================================

    #[test]
    fn pruning_drops_priceless_listings() {
        let s = scorer();
        let catalog = canonical("widget", None, Some("100.00"), None);
        let listing = canonical("widget", None, None, None);
        assert!(!s.plausible_pair(&catalog, &listing));
    }

    #[test]
    fn pruning_drops_wildly_different_prices() {
        let s = scorer();
        let catalog = canonical("widget pro", None, Some("3000.00"), None);
        let listing = canonical("widget pro", None, Some("20.00"), None);
        assert!(!s.plausible_pair(&catalog, &listing));
    }

    #[test]
    fn pruning_keeps_same_vendor_or_shared_token() {
        let s = scorer();
        let catalog = canonical("ecm synchronika", Some("ecm"), Some("3199.00"), None);
        let by_token = canonical("synchronika dual boiler", None, Some("2999.00"), None);
        let by_vendor = canonical("flow control kit", Some("ecm"), Some("3100.00"), None);
        let neither = canonical("encore grinder", Some("baratza"), Some("3100.00"), None);

        assert!(s.plausible_pair(&catalog, &by_token));
        assert!(s.plausible_pair(&catalog, &by_vendor));
        assert!(!s.plausible_pair(&catalog, &neither));
    }
}
