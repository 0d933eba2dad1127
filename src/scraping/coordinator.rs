//! Scrape run orchestration
//!
//! One run covers one competitor: resolve targets, walk their pages with
//! bounded concurrency and a politeness delay, extract listings, and upsert
//! them into the competitor-product store. Failures are isolated per target;
//! a fetch timeout means "zero results for that target", never a failed run.
//! Cancellation is cooperative and leaves already-upserted listings in place
//! as a stale-but-consistent snapshot.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::matching::normalizer::parse_price;
use crate::store::CompetitorProductStore;
use crate::types::{Competitor, CompetitorId, CompetitorProduct, RawListing};

use super::extractor::extract_listings;
use super::fetcher::PageFetcher;
use super::resolver::{FetchTarget, PatternFilter, ResolveError, TargetResolver};

/// Per-run knobs, derived from the scraping section of the main config
#[derive(Debug, Clone)]
pub struct ScrapeRunConfig {
    /// Maximum targets fetched concurrently within one run
    pub max_concurrent_fetches: usize,
    /// Delay between successive page fetches on the same target
    pub politeness_delay: Duration,
    /// Page cap per target
    pub max_pages_per_target: u32,
}

impl ScrapeRunConfig {
    pub fn from_config(config: &crate::config::ScrapingConfig) -> Self {
        Self {
            max_concurrent_fetches: config.max_concurrent_fetches,
            politeness_delay: Duration::from_millis(config.politeness_delay_ms),
            max_pages_per_target: config.max_pages_per_target,
        }
    }
}

impl Default for ScrapeRunConfig {
    fn default() -> Self {
        Self::from_config(&crate::config::ScrapingConfig::default())
    }
}

/// Aggregate statistics for one scrape run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeStats {
    pub targets_resolved: usize,
    pub pages_fetched: u64,
    pub fetch_failures: u64,
    pub listings_seen: u64,
    pub listings_excluded: u64,
    pub products_upserted: u64,
}

/// Runs competitor scrapes against the product store
pub struct ScrapeRunner {
    fetcher: Arc<dyn PageFetcher>,
    resolver: TargetResolver,
    products: Arc<CompetitorProductStore>,
    config: ScrapeRunConfig,
}

impl ScrapeRunner {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        products: Arc<CompetitorProductStore>,
        config: ScrapeRunConfig,
    ) -> Self {
        let resolver = TargetResolver::new(Arc::clone(&fetcher));
        Self {
            fetcher,
            resolver,
            products,
            config,
        }
    }

    /// Scrape one competitor. Reports progress through `on_progress` after
    /// each processed page so a job manager can surface live counts.
    pub async fn run(
        &self,
        competitor: &Competitor,
        cancel: CancellationToken,
        on_progress: &(dyn Fn(&ScrapeStats) + Send + Sync),
    ) -> Result<ScrapeStats, ResolveError> {
        let resolved = self.resolver.resolve(competitor).await?;

        let stats = Mutex::new(ScrapeStats {
            targets_resolved: resolved.targets.len(),
            ..ScrapeStats::default()
        });

        if resolved.targets.is_empty() {
            // Not an error: recorded as "no candidates found"
            info!(competitor = %competitor.name, "strategy yielded no fetch targets");
            return Ok(stats.into_inner());
        }

        stream::iter(resolved.targets.clone())
            .map(|target| {
                self.scrape_target(
                    competitor,
                    &resolved.base,
                    &resolved.filter,
                    target,
                    &cancel,
                    &stats,
                    on_progress,
                )
            })
            .buffer_unordered(self.config.max_concurrent_fetches)
            .collect::<Vec<()>>()
            .await;

        let stats = stats.into_inner();
        info!(
            competitor = %competitor.name,
            targets = stats.targets_resolved,
            pages = stats.pages_fetched,
            upserted = stats.products_upserted,
            failures = stats.fetch_failures,
            "scrape run complete"
        );
        Ok(stats)
    }

    /// Walk one target's pages until it reports no further listings.
    #[allow(clippy::too_many_arguments)]
    async fn scrape_target(
        &self,
        competitor: &Competitor,
        base: &Url,
        filter: &PatternFilter,
        target: FetchTarget,
        cancel: &CancellationToken,
        stats: &Mutex<ScrapeStats>,
        on_progress: &(dyn Fn(&ScrapeStats) + Send + Sync),
    ) {
        for page in 1..=self.config.max_pages_per_target {
            if cancel.is_cancelled() {
                debug!(competitor = %competitor.name, ?target, "scrape cancelled mid-target");
                return;
            }
            let Some(url) = target.page_url(base, page) else {
                break;
            };

            let fetched = match self.fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(e) => {
                    // A timeout or error on one target is zero results for
                    // it, not a failed run
                    warn!(%url, error = %e, "target fetch failed");
                    stats.lock().fetch_failures += 1;
                    break;
                }
            };
            stats.lock().pages_fetched += 1;

            let listings = extract_listings(&fetched, base);
            if listings.is_empty() {
                break;
            }

            for listing in &listings {
                let mut guard = stats.lock();
                guard.listings_seen += 1;

                if let Some(substr) = target.listing_filter() {
                    if !listing_matches_filter(listing, substr) {
                        guard.listings_excluded += 1;
                        continue;
                    }
                }
                let path = listing_path(&listing.url);
                if !filter.allows(&path) {
                    guard.listings_excluded += 1;
                    continue;
                }
                drop(guard);

                self.products
                    .upsert(listing_to_product(competitor.id, listing));
                stats.lock().products_upserted += 1;
            }

            let snapshot = stats.lock().clone();
            on_progress(&snapshot);

            if !self.config.politeness_delay.is_zero() {
                tokio::time::sleep(self.config.politeness_delay).await;
            }
        }
    }
}

/// Substring filter for full catalog crawls: case-insensitive match against
/// title, vendor, or tags.
fn listing_matches_filter(listing: &RawListing, substr: &str) -> bool {
    let needle = substr.to_lowercase();
    if listing.title.to_lowercase().contains(&needle) {
        return true;
    }
    if let Some(vendor) = &listing.vendor {
        if vendor.to_lowercase().contains(&needle) {
            return true;
        }
    }
    listing
        .tags
        .iter()
        .any(|tag| tag.to_lowercase().contains(&needle))
}

/// Path component of a listing URL, for pattern filtering
fn listing_path(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// Build the stored competitor product from a raw listing. The listing URL
/// doubles as the stable product id, so re-scrapes upsert instead of
/// duplicating.
pub fn listing_to_product(competitor_id: CompetitorId, listing: &RawListing) -> CompetitorProduct {
    let now = Utc::now();
    CompetitorProduct {
        id: listing.url.clone(),
        competitor_id,
        title: listing.title.clone(),
        vendor: listing.vendor.clone(),
        price: listing.price_text.as_deref().and_then(parse_price),
        sku: listing.sku.clone(),
        product_type: listing.product_type.clone(),
        url: listing.url.clone(),
        first_seen_at: now,
        last_seen_at: now,
    }
}
