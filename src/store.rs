//! In-memory stores for competitors, scraped listings, matches, the pair
//! blacklist, and violations
//!
//! Matches and blacklist entries are the only structures requiring
//! write-serialization per pair; both are keyed on
//! (catalog_product_id, competitor_product_id) so concurrent scoring runs
//! upsert rather than duplicate. Violations are keyed per match id for the
//! same reason.

use anyhow::Result;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

use crate::matching::BlacklistLookup;
use crate::types::{
    BlacklistEntry, CatalogProductId, Competitor, CompetitorId, CompetitorProduct,
    CompetitorProductId, Confidence, MatchId, MatchState, PairKey, ProductMatch, ScrapingStrategy,
    Violation, ViolationId,
};

// ============================================================================
// Competitors
// ============================================================================

/// Store of monitored competitor configurations
#[derive(Default)]
pub struct CompetitorStore {
    competitors: DashMap<CompetitorId, Competitor>,
}

impl CompetitorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a competitor. The domain is the natural key: an
    /// upsert for a known domain keeps the existing id and scrape history.
    pub fn upsert(&self, incoming: Competitor) -> Competitor {
        let existing = self
            .competitors
            .iter()
            .find(|entry| entry.domain == incoming.domain)
            .map(|entry| (entry.id, entry.last_scraped_at));

        let stored = match existing {
            Some((id, last_scraped_at)) => Competitor {
                id,
                last_scraped_at,
                ..incoming
            },
            None => incoming,
        };
        self.competitors.insert(stored.id, stored.clone());
        stored
    }

    pub fn get(&self, id: &CompetitorId) -> Option<Competitor> {
        self.competitors.get(id).map(|entry| entry.clone())
    }

    /// All competitors, sorted by name for stable listings
    pub fn list(&self) -> Vec<Competitor> {
        let mut all: Vec<Competitor> = self
            .competitors
            .iter()
            .map(|entry| entry.clone())
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn set_last_scraped(&self, id: &CompetitorId) {
        if let Some(mut entry) = self.competitors.get_mut(id) {
            entry.last_scraped_at = Some(Utc::now());
        }
    }

    pub fn len(&self) -> usize {
        self.competitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.competitors.is_empty()
    }
}

/// One competitor entry in the seed roster file
#[derive(Debug, Deserialize)]
struct CompetitorSeed {
    name: String,
    domain: String,
    #[serde(flatten)]
    strategy: ScrapingStrategy,
    #[serde(default)]
    exclude_patterns: Vec<String>,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct CompetitorsFile {
    #[serde(default)]
    competitors: Vec<CompetitorSeed>,
}

/// Load a TOML roster of competitors, assigning fresh ids.
pub fn load_competitors_file(path: &Path) -> Result<Vec<Competitor>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!("Failed to read competitors file '{}': {}", path.display(), e)
    })?;
    let file: CompetitorsFile = toml::from_str(&content).map_err(|e| {
        anyhow::anyhow!("Failed to parse competitors file '{}': {}", path.display(), e)
    })?;
    Ok(file
        .competitors
        .into_iter()
        .map(|seed| Competitor {
            id: Uuid::new_v4(),
            name: seed.name,
            domain: seed.domain,
            strategy: seed.strategy,
            exclude_patterns: seed.exclude_patterns,
            is_active: seed.is_active,
            last_scraped_at: None,
        })
        .collect())
}

// ============================================================================
// Competitor products
// ============================================================================

/// Store of scraped competitor listings, upserted on each scrape run
#[derive(Default)]
pub struct CompetitorProductStore {
    products: DashMap<CompetitorProductId, CompetitorProduct>,
}

impl CompetitorProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a listing. The discovery time of the first sighting
    /// is preserved; everything else reflects the latest scrape.
    pub fn upsert(&self, mut product: CompetitorProduct) -> CompetitorProduct {
        if let Some(existing) = self.products.get(&product.id) {
            product.first_seen_at = existing.first_seen_at;
        }
        self.products.insert(product.id.clone(), product.clone());
        product
    }

    pub fn get(&self, id: &str) -> Option<CompetitorProduct> {
        self.products.get(id).map(|entry| entry.clone())
    }

    pub fn all(&self) -> Vec<CompetitorProduct> {
        self.products.iter().map(|entry| entry.clone()).collect()
    }

    pub fn list_for(&self, competitor_id: &CompetitorId) -> Vec<CompetitorProduct> {
        self.products
            .iter()
            .filter(|entry| entry.competitor_id == *competitor_id)
            .map(|entry| entry.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

// ============================================================================
// Matches
// ============================================================================

/// Outcome of an auto-match upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// The pair is held by a manual/verified match, which scoring never alters
    SkippedPinned,
}

/// Store of product matches.
///
/// At most one active (non-rejected, non-deleted) match exists per pair;
/// rejected and deleted matches are soft-retired rather than dropped so the
/// blacklist linkage and audit trail survive.
#[derive(Default)]
pub struct MatchStore {
    active: DashMap<PairKey, ProductMatch>,
    by_id: DashMap<MatchId, PairKey>,
    retired: Mutex<Vec<ProductMatch>>,
}

impl MatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &MatchId) -> Option<ProductMatch> {
        let pair = self.by_id.get(id)?.clone();
        self.active.get(&pair).map(|entry| entry.clone())
    }

    pub fn get_active_pair(&self, pair: &PairKey) -> Option<ProductMatch> {
        self.active.get(pair).map(|entry| entry.clone())
    }

    /// Upsert an auto-scored candidate. Pending matches are re-scored in
    /// place; manual and verified matches are pinned and never altered.
    pub fn upsert_auto(
        &self,
        catalog_product_id: CatalogProductId,
        competitor_product_id: CompetitorProductId,
        competitor_id: CompetitorId,
        score: f64,
        confidence: Confidence,
    ) -> UpsertOutcome {
        let pair = (catalog_product_id.clone(), competitor_product_id.clone());
        if let Some(mut existing) = self.active.get_mut(&pair) {
            if existing.is_manual_match {
                return UpsertOutcome::SkippedPinned;
            }
            existing.overall_score = score;
            existing.confidence = confidence;
            existing.updated_at = Utc::now();
            return UpsertOutcome::Updated;
        }

        let now = Utc::now();
        let record = ProductMatch {
            id: Uuid::new_v4(),
            catalog_product_id,
            competitor_product_id,
            competitor_id,
            overall_score: score,
            confidence,
            is_manual_match: false,
            state: MatchState::Pending,
            created_at: now,
            updated_at: now,
        };
        self.by_id.insert(record.id, pair.clone());
        self.active.insert(pair, record);
        UpsertOutcome::Created
    }

    /// Apply a mutation to the active match for a pair, returning the updated
    /// record.
    pub fn update_in_place<F>(&self, pair: &PairKey, mutate: F) -> Option<ProductMatch>
    where
        F: FnOnce(&mut ProductMatch),
    {
        let mut entry = self.active.get_mut(pair)?;
        mutate(&mut entry);
        entry.updated_at = Utc::now();
        Some(entry.clone())
    }

    /// Insert a brand-new active match. The pair slot must be free.
    pub fn insert(&self, record: ProductMatch) -> bool {
        let pair = record.pair();
        if self.active.contains_key(&pair) {
            return false;
        }
        self.by_id.insert(record.id, pair.clone());
        self.active.insert(pair, record);
        true
    }

    /// Move an active match into a terminal state, retiring it from the
    /// active slot. Returns the retired record.
    pub fn retire(&self, id: &MatchId, terminal_state: MatchState) -> Option<ProductMatch> {
        debug_assert!(!terminal_state.is_active());
        let (_, pair) = self.by_id.remove(id)?;
        let (_, mut record) = self.active.remove(&pair)?;
        record.state = terminal_state;
        record.updated_at = Utc::now();
        self.retired.lock().push(record.clone());
        Some(record)
    }

    /// All active matches
    pub fn active_matches(&self) -> Vec<ProductMatch> {
        self.active.iter().map(|entry| entry.clone()).collect()
    }

    /// Page through active matches, most recently updated first.
    /// Returns the page plus the total active count.
    pub fn list_page(
        &self,
        state: Option<MatchState>,
        page: usize,
        per_page: usize,
    ) -> (Vec<ProductMatch>, usize) {
        let mut all: Vec<ProductMatch> = self
            .active
            .iter()
            .filter(|entry| state.map_or(true, |s| entry.state == s))
            .map(|entry| entry.clone())
            .collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let total = all.len();
        let start = page.saturating_sub(1) * per_page;
        let page_items = all.into_iter().skip(start).take(per_page).collect();
        (page_items, total)
    }

    pub fn retired_matches(&self) -> Vec<ProductMatch> {
        self.retired.lock().clone()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

// ============================================================================
// Blacklist
// ============================================================================

/// Permanent suppression list of pairs that must never be auto-matched again
#[derive(Default)]
pub struct BlacklistStore {
    entries: DashMap<PairKey, BlacklistEntry>,
}

impl BlacklistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pair. Idempotent: re-rejecting an already-blacklisted pair
    /// keeps the original entry.
    pub fn insert(&self, entry: BlacklistEntry) {
        let pair = (
            entry.catalog_product_id.clone(),
            entry.competitor_product_id.clone(),
        );
        self.entries.entry(pair).or_insert(entry);
    }

    pub fn contains(&self, catalog_product_id: &str, competitor_product_id: &str) -> bool {
        self.entries.contains_key(&(
            catalog_product_id.to_string(),
            competitor_product_id.to_string(),
        ))
    }

    /// Remove a pair so it may be matched again (operator action)
    pub fn remove(&self, catalog_product_id: &str, competitor_product_id: &str) -> bool {
        self.entries
            .remove(&(
                catalog_product_id.to_string(),
                competitor_product_id.to_string(),
            ))
            .is_some()
    }

    pub fn list(&self) -> Vec<BlacklistEntry> {
        self.entries.iter().map(|entry| entry.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BlacklistLookup for BlacklistStore {
    fn is_blacklisted(&self, catalog_product_id: &str, competitor_product_id: &str) -> bool {
        self.contains(catalog_product_id, competitor_product_id)
    }
}

// ============================================================================
// Violations
// ============================================================================

/// Store of violations: at most one open violation per match, plus the
/// closed/resolved history.
#[derive(Default)]
pub struct ViolationStore {
    open: DashMap<MatchId, Violation>,
    open_ids: DashMap<ViolationId, MatchId>,
    closed: Mutex<Vec<Violation>>,
}

impl ViolationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_for_match(&self, match_id: &MatchId) -> Option<Violation> {
        self.open.get(match_id).map(|entry| entry.clone())
    }

    /// Create a violation for a match, or refresh the open one in place.
    /// The open violation keeps its id and detection time; observed price,
    /// delta, percent, and severity reflect the latest scan.
    ///
    /// Returns true when a new violation was created.
    pub fn upsert_open(&self, violation: Violation) -> bool {
        if let Some(mut existing) = self.open.get_mut(&violation.match_id) {
            existing.reference_price = violation.reference_price;
            existing.observed_price = violation.observed_price;
            existing.price_delta = violation.price_delta;
            existing.violation_percent = violation.violation_percent;
            existing.severity = violation.severity;
            existing.updated_at = Utc::now();
            return false;
        }
        self.open_ids.insert(violation.id, violation.match_id);
        self.open.insert(violation.match_id, violation);
        true
    }

    /// Close the open violation for a match, if any. `resolved_by` is None
    /// when the condition cleared on its own or the match was removed.
    pub fn close_for_match(&self, match_id: &MatchId, resolved_by: Option<String>) -> Option<Violation> {
        let (_, mut violation) = self.open.remove(match_id)?;
        self.open_ids.remove(&violation.id);
        let now = Utc::now();
        violation.resolved = true;
        violation.resolved_by = resolved_by;
        violation.resolved_at = Some(now);
        violation.updated_at = now;
        self.closed.lock().push(violation.clone());
        Some(violation)
    }

    /// Operator resolution of an open violation by id.
    pub fn resolve(&self, id: &ViolationId, resolved_by: String) -> Option<Violation> {
        let match_id = self.open_ids.get(id).map(|entry| *entry)?;
        self.close_for_match(&match_id, Some(resolved_by))
    }

    pub fn get(&self, id: &ViolationId) -> Option<Violation> {
        if let Some(match_id) = self.open_ids.get(id).map(|entry| *entry) {
            return self.open_for_match(&match_id);
        }
        self.closed.lock().iter().find(|v| v.id == *id).cloned()
    }

    /// All violations, optionally filtered by resolved state, newest first.
    pub fn list(&self, resolved: Option<bool>) -> Vec<Violation> {
        let mut all: Vec<Violation> = Vec::new();
        if resolved != Some(true) {
            all.extend(self.open.iter().map(|entry| entry.clone()));
        }
        if resolved != Some(false) {
            all.extend(self.closed.lock().iter().cloned());
        }
        all.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        all
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
