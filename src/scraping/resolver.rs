//! Scrape target resolution
//!
//! Turns a competitor configuration into a concrete, ordered set of fetch
//! targets. The `url_patterns` and `search_terms` strategies degrade through
//! an ordered list of tiers (site search endpoint → inferred collection
//! slugs → full catalog scan with a substring filter), stopping at the first
//! tier that yields anything so probing stays cheap. Exclude patterns are
//! applied last, over the final candidate set, uniformly for every strategy.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::types::{Competitor, ScrapingStrategy};

use super::extractor::extract_listings;
use super::fetcher::PageFetcher;

/// Listing pages fetched per request on paginated endpoints
const PAGE_LIMIT: u32 = 250;

/// Domain-specific suffixes appended when synthesizing collection slugs
const SLUG_SUFFIXES: &[&str] = &["espresso", "machines", "grinders", "espresso-machines"];

/// Errors from target resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("competitor site '{domain}' unreachable: {reason}")]
    Unreachable { domain: String, reason: String },
    #[error("invalid competitor domain '{0}'")]
    InvalidDomain(String),
    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// A concrete page-fetch target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchTarget {
    /// A collection listing, paginated until it reports no further products
    Collection { handle: String },
    /// The site's built-in search endpoint for one term
    Search { term: String },
    /// Walk the whole catalog; listings are filtered by substring afterwards
    CatalogCrawl { filter: Option<String> },
}

impl FetchTarget {
    /// URL for the given 1-based page of this target, or None when the
    /// target has no further pages.
    pub fn page_url(&self, base: &Url, page: u32) -> Option<Url> {
        match self {
            FetchTarget::Collection { handle } => {
                let mut url = base
                    .join(&format!("/collections/{}/products.json", handle))
                    .ok()?;
                url.query_pairs_mut()
                    .append_pair("limit", &PAGE_LIMIT.to_string())
                    .append_pair("page", &page.to_string());
                Some(url)
            }
            FetchTarget::Search { term } => {
                if page > 1 {
                    return None;
                }
                let mut url = base.join("/search/suggest.json").ok()?;
                url.query_pairs_mut()
                    .append_pair("q", &term.replace('-', " "))
                    .append_pair("resources[type]", "product")
                    .append_pair("resources[limit]", "10");
                Some(url)
            }
            FetchTarget::CatalogCrawl { .. } => {
                let mut url = base.join("/products.json").ok()?;
                url.query_pairs_mut()
                    .append_pair("limit", &PAGE_LIMIT.to_string())
                    .append_pair("page", &page.to_string());
                Some(url)
            }
        }
    }

    /// Representative path used when applying exclude patterns to targets
    pub fn path(&self) -> String {
        match self {
            FetchTarget::Collection { handle } => format!("/collections/{}", handle),
            FetchTarget::Search { term } => format!("/search/{}", term),
            FetchTarget::CatalogCrawl { .. } => "/products.json".to_string(),
        }
    }

    /// Substring filter applied to listings fetched from this target
    pub fn listing_filter(&self) -> Option<&str> {
        match self {
            FetchTarget::CatalogCrawl { filter } => filter.as_deref(),
            _ => None,
        }
    }
}

/// Which fallback tier ended up supplying the targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FallbackTier {
    SearchApi,
    InferredCollections,
    CatalogScan,
}

/// Include/exclude glob filtering over URL paths.
///
/// Globs are compiled with globset's defaults, where `*` crosses path
/// separators, so `*clearance*` suppresses any URL containing "clearance".
#[derive(Debug)]
pub struct PatternFilter {
    includes: Option<GlobSet>,
    excludes: GlobSet,
}

impl PatternFilter {
    pub fn new(
        include_patterns: &[String],
        exclude_patterns: &[String],
    ) -> Result<Self, ResolveError> {
        let includes = if include_patterns.is_empty() {
            None
        } else {
            Some(build_glob_set(include_patterns)?)
        };
        Ok(Self {
            includes,
            excludes: build_glob_set(exclude_patterns)?,
        })
    }

    /// Exclusions win over any include match.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excludes.is_match(path)
    }

    /// True when no include set is configured or the path matches one.
    pub fn passes_includes(&self, path: &str) -> bool {
        self.includes.as_ref().map_or(true, |set| set.is_match(path))
    }

    /// The full filter: included and not excluded.
    pub fn allows(&self, path: &str) -> bool {
        self.passes_includes(path) && !self.is_excluded(path)
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ResolveError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ResolveError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ResolveError::InvalidPattern {
        pattern: patterns.join(", "),
        source,
    })
}

/// The resolved fetch plan for one competitor
pub struct ResolvedTargets {
    pub base: Url,
    pub targets: Vec<FetchTarget>,
    /// Deepest fallback tier used, when the strategy required probing
    pub tier: Option<FallbackTier>,
    pub filter: PatternFilter,
}

/// Resolves a competitor configuration into fetch targets, probing the site
/// where the strategy requires it
pub struct TargetResolver {
    fetcher: Arc<dyn PageFetcher>,
}

impl TargetResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Resolve the competitor's strategy into an ordered target list.
    ///
    /// An unreachable site is a resolver-level failure for this competitor's
    /// run only. A strategy that yields zero targets after all tiers is not
    /// an error; the caller records "no candidates found".
    pub async fn resolve(&self, competitor: &Competitor) -> Result<ResolvedTargets, ResolveError> {
        let base = base_url(&competitor.domain)?;
        self.check_reachable(&base, &competitor.domain).await?;

        let (targets, tier, include_patterns) = match &competitor.strategy {
            ScrapingStrategy::Collections { collections } => {
                let targets = collections
                    .iter()
                    .map(|handle| FetchTarget::Collection {
                        handle: slugify(handle),
                    })
                    .collect();
                (targets, None, Vec::new())
            }
            ScrapingStrategy::UrlPatterns { patterns } => {
                let mut targets = Vec::new();
                let mut deepest = None;
                for pattern in patterns {
                    let term = pattern_term(pattern);
                    if term.is_empty() {
                        warn!(%pattern, "url pattern yields no probe term; falling back to catalog scan");
                        targets.push(FetchTarget::CatalogCrawl { filter: None });
                        deepest = deepest.max(Some(FallbackTier::CatalogScan));
                        continue;
                    }
                    let (tier, term_targets) = self.resolve_term(&base, &term).await;
                    deepest = deepest.max(Some(tier));
                    targets.extend(term_targets);
                }
                (targets, deepest, patterns.clone())
            }
            ScrapingStrategy::SearchTerms { terms } => {
                let mut targets = Vec::new();
                let mut deepest = None;
                for term in terms {
                    let (tier, term_targets) = self.resolve_term(&base, &slugify(term)).await;
                    deepest = deepest.max(Some(tier));
                    targets.extend(term_targets);
                }
                (targets, deepest, Vec::new())
            }
        };

        let filter = PatternFilter::new(&include_patterns, &competitor.exclude_patterns)?;

        // Dedupe, then apply excludes as the last step over the candidate set
        let mut seen = HashSet::new();
        let targets: Vec<FetchTarget> = targets
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .filter(|t| !filter.is_excluded(&t.path()))
            .collect();

        debug!(
            competitor = %competitor.name,
            strategy = competitor.strategy.name(),
            targets = targets.len(),
            ?tier,
            "resolved fetch targets"
        );

        Ok(ResolvedTargets {
            base,
            targets,
            tier,
            filter,
        })
    }

    /// One term through the tier ladder, stopping at the first tier that
    /// yields anything.
    async fn resolve_term(&self, base: &Url, term: &str) -> (FallbackTier, Vec<FetchTarget>) {
        // Tier 1: the site's own search endpoint
        let search = FetchTarget::Search {
            term: term.to_string(),
        };
        if self.probe_yields(&search, base).await {
            return (FallbackTier::SearchApi, vec![search]);
        }

        // Tier 2: synthesized collection slugs
        let mut found = Vec::new();
        for slug in slug_variants(term) {
            let candidate = FetchTarget::Collection { handle: slug };
            if self.probe_yields(&candidate, base).await {
                found.push(candidate);
            }
        }
        if !found.is_empty() {
            return (FallbackTier::InferredCollections, found);
        }

        // Tier 3: full catalog scan filtered by substring
        (
            FallbackTier::CatalogScan,
            vec![FetchTarget::CatalogCrawl {
                filter: Some(term.replace('-', " ")),
            }],
        )
    }

    /// Probe a target's first page and report whether it yields any listing.
    /// Fetch failures count as "no results" here; site-level unreachability
    /// was already ruled out.
    async fn probe_yields(&self, target: &FetchTarget, base: &Url) -> bool {
        let Some(url) = target.page_url(base, 1) else {
            return false;
        };
        match self.fetcher.fetch(&url).await {
            Ok(page) => !extract_listings(&page, base).is_empty(),
            Err(e) => {
                debug!(%url, error = %e, "probe miss");
                false
            }
        }
    }

    async fn check_reachable(&self, base: &Url, domain: &str) -> Result<(), ResolveError> {
        let probe = base
            .join("/products.json?limit=1")
            .map_err(|_| ResolveError::InvalidDomain(domain.to_string()))?;
        match self.fetcher.fetch(&probe).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_unreachable() => Err(ResolveError::Unreachable {
                domain: domain.to_string(),
                reason: e.to_string(),
            }),
            // Reachable but e.g. 404 on the catalog endpoint; strategies
            // may still work through other paths
            Err(_) => Ok(()),
        }
    }
}

fn base_url(domain: &str) -> Result<Url, ResolveError> {
    let trimmed = domain.trim().trim_end_matches('/');
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&with_scheme).map_err(|_| ResolveError::InvalidDomain(domain.to_string()))?;
    if url.host_str().is_none() {
        return Err(ResolveError::InvalidDomain(domain.to_string()));
    }
    Ok(url)
}

/// Case-normalized slug: lowercase, alphanumerics kept, everything else
/// collapsed to single hyphens.
pub fn slugify(term: &str) -> String {
    let mut slug = String::with_capacity(term.len());
    let mut last_dash = false;
    for c in term.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !slug.is_empty() {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Slug variants probed as candidate collection handles: the hyphenated
/// slug, the joined form, and a small set of domain-suffix variants.
pub fn slug_variants(term: &str) -> Vec<String> {
    let hyphenated = slugify(term);
    if hyphenated.is_empty() {
        return Vec::new();
    }
    let mut variants = vec![hyphenated.clone()];
    let joined = hyphenated.replace('-', "");
    if joined != hyphenated {
        variants.push(joined);
    }
    for suffix in SLUG_SUFFIXES {
        if !hyphenated.ends_with(suffix) {
            variants.push(format!("{}-{}", hyphenated, suffix));
        }
    }
    variants
}

/// Derive the probe term from a URL glob: the last path segment with glob
/// metacharacters removed, e.g. "/products/ecm-*" → "ecm".
fn pattern_term(pattern: &str) -> String {
    let last = pattern.rsplit('/').next().unwrap_or(pattern);
    let cleaned: String = last.chars().filter(|c| !matches!(c, '*' | '?' | '[' | ']')).collect();
    cleaned.trim_matches('-').trim_matches('_').to_ascii_lowercase()
}
