//! Competitor scraping subsystem
//!
//! Turns competitor configurations into scraped listings:
//! - `TargetResolver`: strategy → concrete fetch targets, with the
//!   search → inferred-collections → catalog-scan fallback ladder
//! - `PageFetcher` / `HttpFetcher`: the opaque page-fetch capability
//! - `extract_listings`: storefront JSON / HTML → raw listings
//! - `ScrapeRunner`: one bounded-concurrency run per competitor

pub mod coordinator;
pub mod extractor;
pub mod fetcher;
pub mod resolver;

pub use coordinator::{ScrapeRunner, ScrapeRunConfig, ScrapeStats};
pub use fetcher::{FetchConfig, FetchError, FetchedPage, HttpFetcher, PageFetcher};
pub use resolver::{FallbackTier, FetchTarget, PatternFilter, ResolveError, TargetResolver};
