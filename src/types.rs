//! Core domain types for mapwatch

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a merchant catalog product (assigned by the catalog platform)
pub type CatalogProductId = String;

/// Unique identifier for a scraped competitor listing (the canonical listing URL)
pub type CompetitorProductId = String;

/// Unique identifier for a monitored competitor
pub type CompetitorId = Uuid;

/// Unique identifier for a product match
pub type MatchId = Uuid;

/// Unique identifier for a violation record
pub type ViolationId = Uuid;

/// The (catalog, competitor listing) pair a match or blacklist entry refers to
pub type PairKey = (CatalogProductId, CompetitorProductId);

// ============================================================================
// Competitors
// ============================================================================

/// How listings are discovered on a competitor site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ScrapingStrategy {
    /// Scrape the named collections directly
    Collections { collections: Vec<String> },
    /// Discover listings whose URL matches one of the glob patterns
    UrlPatterns { patterns: Vec<String> },
    /// Discover listings via site search for the given terms
    SearchTerms { terms: Vec<String> },
}

impl ScrapingStrategy {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            ScrapingStrategy::Collections { .. } => "collections",
            ScrapingStrategy::UrlPatterns { .. } => "url_patterns",
            ScrapingStrategy::SearchTerms { .. } => "search_terms",
        }
    }
}

/// A monitored competitor site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competitor {
    pub id: CompetitorId,
    pub name: String,
    /// Bare hostname, e.g. "shop.example.com"
    pub domain: String,
    #[serde(flatten)]
    pub strategy: ScrapingStrategy,
    /// Glob patterns; any candidate URL matching one of these is dropped
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub last_scraped_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Products
// ============================================================================

/// A merchant-owned product, read from the external catalog feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: CatalogProductId,
    pub title: String,
    pub vendor: String,
    pub product_type: String,
    #[serde(default)]
    pub sku: Option<String>,
    /// Merchant's own live price
    pub price: Decimal,
    /// Separately configured MAP value, when the feed provides one
    #[serde(default)]
    pub map_price: Option<Decimal>,
}

impl CatalogProduct {
    /// The enforcement floor: the configured MAP value when present,
    /// the merchant's own price otherwise.
    pub fn map_floor(&self) -> Decimal {
        self.map_price.unwrap_or(self.price)
    }
}

/// A listing scraped from a competitor site; holds the latest known price only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorProduct {
    pub id: CompetitorProductId,
    pub competitor_id: CompetitorId,
    pub title: String,
    pub vendor: Option<String>,
    /// None when the scraped price was missing or unparseable; such
    /// listings are stored but excluded from candidate generation.
    pub price: Option<Decimal>,
    pub sku: Option<String>,
    pub product_type: Option<String>,
    pub url: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl CompetitorProduct {
    /// Whether this listing can participate in match scoring
    pub fn is_matchable(&self) -> bool {
        self.price.is_some() && !self.title.trim().is_empty()
    }
}

/// A raw listing as extracted from a fetched page, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListing {
    pub title: String,
    pub vendor: Option<String>,
    pub price_text: Option<String>,
    pub sku: Option<String>,
    pub product_type: Option<String>,
    pub tags: Vec<String>,
    /// Absolute listing URL
    pub url: String,
}

/// The normalized, comparable representation used as scoring input
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalProduct {
    pub title: String,
    pub vendor: Option<String>,
    pub price: Option<Decimal>,
    pub product_type: Option<String>,
    pub sku: Option<String>,
}

// ============================================================================
// Matches
// ============================================================================

/// Discrete confidence bucket derived from a continuous match score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    /// Operator-confirmed or operator-created; pinned at score 1.0
    Manual,
    /// Below the emission floor; never stored on a match record
    Reject,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Manual => "manual",
            Confidence::Reject => "reject",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle state of a product match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    /// Newly scored by the engine, awaiting review
    Pending,
    /// Operator-confirmed auto match
    Verified,
    /// Operator-created from scratch, bypassing scoring
    Manual,
    /// Terminal; the pair is blacklisted
    Rejected,
    /// Terminal; the pair may be re-matched later
    Deleted,
}

impl MatchState {
    /// Active matches participate in violation scanning and hold the
    /// one-active-match-per-pair slot.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            MatchState::Pending | MatchState::Verified | MatchState::Manual
        )
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchState::Pending => "pending",
            MatchState::Verified => "verified",
            MatchState::Manual => "manual",
            MatchState::Rejected => "rejected",
            MatchState::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// A confidence-scored correspondence between one catalog product and one
/// competitor listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductMatch {
    pub id: MatchId,
    pub catalog_product_id: CatalogProductId,
    pub competitor_product_id: CompetitorProductId,
    pub competitor_id: CompetitorId,
    /// 0.0–1.0; manual and verified matches are pinned at 1.0
    pub overall_score: f64,
    pub confidence: Confidence,
    pub is_manual_match: bool,
    pub state: MatchState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductMatch {
    /// The pair this match claims
    pub fn pair(&self) -> PairKey {
        (
            self.catalog_product_id.clone(),
            self.competitor_product_id.clone(),
        )
    }
}

// ============================================================================
// Blacklist
// ============================================================================

/// A permanent record that a pair must never be auto-matched again
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub catalog_product_id: CatalogProductId,
    pub competitor_product_id: CompetitorProductId,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Violations
// ============================================================================

/// How far below the MAP floor a violation sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        };
        write!(f, "{}", s)
    }
}

/// A MAP violation derived from a match plus current prices at scan time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: ViolationId,
    pub match_id: MatchId,
    pub catalog_product_id: CatalogProductId,
    pub competitor_product_id: CompetitorProductId,
    pub competitor_id: CompetitorId,
    /// The MAP floor at scan time
    pub reference_price: Decimal,
    /// The competitor's advertised price at scan time
    pub observed_price: Decimal,
    /// reference_price - observed_price (positive for a violation)
    pub price_delta: Decimal,
    /// (reference_price - observed_price) / reference_price
    pub violation_percent: f64,
    pub severity: Severity,
    pub resolved: bool,
    /// Operator who resolved it; None when the condition cleared on its own
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub detected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
