//! mapwatch: competitor price monitoring and MAP violation detection
//!
//! The engine discovers competitor product listings, computes confidence-
//! scored correspondences against the merchant's own catalog, and derives
//! Minimum-Advertised-Price violations from those correspondences, with a
//! human-in-the-loop correction workflow (verify / unmatch / blacklist):
//! - Scrape target resolution with a tiered discovery fallback
//! - Canonical product normalization and hybrid match scoring
//! - Match lifecycle state machine with pair blacklisting
//! - Violation detection, trend statistics, and export
//! - Background scrape jobs and an HTTP API for operators

pub mod catalog;
pub mod config;
pub mod daemon;
pub mod matching;
pub mod scraping;
pub mod store;
pub mod types;
pub mod violations;

pub use config::Config;
pub use types::*;
