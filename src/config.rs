//! Configuration for mapwatch

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for a mapwatch deployment
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP API server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Catalog feed configuration
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Scraping configuration
    #[serde(default)]
    pub scraping: ScrapingConfig,
    /// Match scoring configuration
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Violation detection configuration
    #[serde(default)]
    pub violations: ViolationsConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together so the user
    /// can fix everything in one pass.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Server validation
        if let Some(port_str) = self.server.listen_addr.rsplit(':').next() {
            if let Ok(port) = port_str.parse::<u32>() {
                if port == 0 || port > 65535 {
                    errors.push(format!(
                        "listen port must be between 1 and 65535, got {}",
                        port
                    ));
                }
            }
        }

        // Scraping validation
        if self.scraping.max_concurrent_fetches == 0 {
            errors.push("max_concurrent_fetches must be positive".to_string());
        }
        if self.scraping.request_timeout_secs == 0 {
            errors.push("request_timeout_secs must be positive".to_string());
        }
        if self.scraping.max_pages_per_target == 0 {
            errors.push("max_pages_per_target must be positive".to_string());
        }

        // Matching validation
        if !(0.0..=1.0).contains(&self.matching.title_weight) {
            errors.push("title_weight must be between 0.0 and 1.0".to_string());
        }
        let w = &self.matching.weights;
        let sum = w.brand + w.title_overlap + w.price + w.product_type;
        if (sum - 1.0).abs() > 1e-6 {
            errors.push(format!("attribute weights must sum to 1.0, got {:.4}", sum));
        }
        for (name, value) in [
            ("weights.brand", w.brand),
            ("weights.title_overlap", w.title_overlap),
            ("weights.price", w.price),
            ("weights.product_type", w.product_type),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{} must be between 0.0 and 1.0", name));
            }
        }
        let t = &self.matching.thresholds;
        if !(t.high > t.medium && t.medium > t.low) {
            errors.push(format!(
                "confidence thresholds must be strictly descending (high > medium > low), got {}/{}/{}",
                t.high, t.medium, t.low
            ));
        }
        if t.high > 1.0 || t.low <= 0.0 {
            errors.push("confidence thresholds must lie in (0.0, 1.0]".to_string());
        }
        if !(0.0 < self.matching.price_tolerance && self.matching.price_tolerance < 1.0) {
            errors.push("price_tolerance must be between 0.0 and 1.0 (exclusive)".to_string());
        }
        if !(0.0..=1.0).contains(&self.matching.min_brand_similarity) {
            errors.push("min_brand_similarity must be between 0.0 and 1.0".to_string());
        }

        // Violations validation
        let v = &self.violations;
        if !(v.severe_threshold > v.moderate_threshold && v.moderate_threshold > v.minor_threshold)
        {
            errors.push(format!(
                "severity thresholds must be strictly descending (severe > moderate > minor), got {}/{}/{}",
                v.severe_threshold, v.moderate_threshold, v.minor_threshold
            ));
        }
        if v.minor_threshold <= 0.0 || v.severe_threshold >= 1.0 {
            errors.push("severity thresholds must lie in (0.0, 1.0)".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. "127.0.0.1:8080"
    pub listen_addr: String,
    /// API keys for authentication (empty = no auth required)
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Enable CORS for browser-based clients
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            api_keys: Vec::new(),
            cors_enabled: false,
        }
    }
}

/// Where the merchant's product feed comes from
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    /// Path to the JSON product feed exported by the catalog platform
    #[serde(default)]
    pub feed_path: Option<PathBuf>,
}

/// Scraping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingConfig {
    /// TOML roster of competitors to seed the store with at startup
    #[serde(default)]
    pub competitors_path: Option<PathBuf>,
    /// Maximum concurrent page fetches within one competitor scrape
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Connection timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Delay between successive page fetches on the same target (milliseconds)
    #[serde(default = "default_politeness_delay")]
    pub politeness_delay_ms: u64,
    /// Maximum listing pages to walk per fetch target
    #[serde(default = "default_max_pages_per_target")]
    pub max_pages_per_target: u32,
    /// Maximum response size (bytes)
    #[serde(default = "default_max_content_size")]
    pub max_content_size: usize,
    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    20
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_politeness_delay() -> u64 {
    500
}

fn default_max_pages_per_target() -> u32 {
    50
}

fn default_max_content_size() -> usize {
    5 * 1024 * 1024 // 5 MB
}

fn default_user_agent() -> String {
    "mapwatch-bot/0.1".to_string()
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            competitors_path: None,
            max_concurrent_fetches: default_max_concurrent_fetches(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            politeness_delay_ms: default_politeness_delay(),
            max_pages_per_target: default_max_pages_per_target(),
            max_content_size: default_max_content_size(),
            user_agent: default_user_agent(),
        }
    }
}

/// Match scoring configuration.
///
/// The overall score is `title_weight * title_similarity +
/// (1 - title_weight) * attribute_score`; the attribute score is the weighted
/// sum of the four factors below. Confidence tiers are calibrated against
/// these weights, so changing them warrants re-reviewing the thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Weight of the title-similarity component in the overall score
    #[serde(default = "default_title_weight")]
    pub title_weight: f64,
    /// Relative weights of the four attribute factors (must sum to 1.0)
    #[serde(default)]
    pub weights: AttributeWeights,
    /// Confidence tier thresholds over the overall score
    #[serde(default)]
    pub thresholds: TierThresholds,
    /// Price-difference band (as a fraction of the higher price) inside which
    /// prices are considered close
    #[serde(default = "default_price_tolerance")]
    pub price_tolerance: f64,
    /// Minimum Jaro-Winkler similarity for a fuzzy brand match to count
    #[serde(default = "default_min_brand_similarity")]
    pub min_brand_similarity: f64,
}

fn default_title_weight() -> f64 {
    0.4
}

fn default_price_tolerance() -> f64 {
    0.25
}

fn default_min_brand_similarity() -> f64 {
    0.85
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            title_weight: default_title_weight(),
            weights: AttributeWeights::default(),
            thresholds: TierThresholds::default(),
            price_tolerance: default_price_tolerance(),
            min_brand_similarity: default_min_brand_similarity(),
        }
    }
}

/// Relative weights of the attribute-score factors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeWeights {
    pub brand: f64,
    pub title_overlap: f64,
    pub price: f64,
    pub product_type: f64,
}

impl Default for AttributeWeights {
    fn default() -> Self {
        Self {
            brand: 0.35,
            title_overlap: 0.30,
            price: 0.20,
            product_type: 0.15,
        }
    }
}

/// Confidence tier thresholds over the overall score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Scores at or above this are high confidence
    pub high: f64,
    /// Scores at or above this (below high) are medium confidence
    pub medium: f64,
    /// Scores at or above this (below medium) are low confidence;
    /// anything below is rejected and never emitted
    pub low: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            high: 0.80,
            medium: 0.70,
            low: 0.60,
        }
    }
}

/// Violation detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationsConfig {
    /// Percent below MAP at or above which a violation is severe
    #[serde(default = "default_severe_threshold")]
    pub severe_threshold: f64,
    /// Percent below MAP at or above which a violation is moderate
    #[serde(default = "default_moderate_threshold")]
    pub moderate_threshold: f64,
    /// Materiality floor; anything below this is not reported at all
    #[serde(default = "default_minor_threshold")]
    pub minor_threshold: f64,
}

fn default_severe_threshold() -> f64 {
    0.20
}

fn default_moderate_threshold() -> f64 {
    0.10
}

fn default_minor_threshold() -> f64 {
    0.05
}

impl Default for ViolationsConfig {
    fn default() -> Self {
        Self {
            severe_threshold: default_severe_threshold(),
            moderate_threshold: default_moderate_threshold(),
            minor_threshold: default_minor_threshold(),
        }
    }
}
