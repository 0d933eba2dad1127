//! Batch scoring pass over the catalog and the scraped competitor products
//!
//! Candidate generation is inherently O(N×M); the engine prunes obviously
//! non-matching pairs with a cheap pre-filter before paying for the
//! similarity computation. The pass is idempotent: pending matches are
//! re-scored in place, manual and verified matches are never altered, and
//! blacklisted pairs are never emitted.

use serde::Serialize;
use tracing::{debug, info};

use crate::store::{MatchStore, UpsertOutcome};
use crate::types::{CanonicalProduct, CatalogProduct, CompetitorProduct, Confidence};

use super::normalizer::{canonicalize_catalog, canonicalize_competitor};
use super::scorer::{BlacklistLookup, MatchScorer};

/// Aggregate result of one scoring pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RescanOutcome {
    /// Pairs examined (after dropping non-matchable listings)
    pub pairs_considered: usize,
    /// Pairs dropped by the cheap pre-filter
    pub pruned: usize,
    /// Pairs suppressed by the blacklist
    pub blacklisted: usize,
    /// Pairs held by a manual/verified match and left untouched
    pub pinned: usize,
    /// Pairs scored below the emission floor
    pub rejected: usize,
    /// Candidate matches newly created
    pub created: usize,
    /// Existing pending matches re-scored in place
    pub updated: usize,
}

/// Runs scoring passes and upserts candidate matches
pub struct MatchEngine {
    scorer: MatchScorer,
}

impl MatchEngine {
    pub fn new(scorer: MatchScorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &MatchScorer {
        &self.scorer
    }

    /// Score every plausible (catalog, competitor listing) pair and upsert
    /// the candidates. Safe to re-run: unchanged inputs yield an unchanged
    /// match set.
    pub fn rescan(
        &self,
        catalog: &[CatalogProduct],
        listings: &[CompetitorProduct],
        matches: &MatchStore,
        blacklist: &dyn BlacklistLookup,
    ) -> RescanOutcome {
        let canonical_catalog: Vec<(&CatalogProduct, CanonicalProduct)> = catalog
            .iter()
            .map(|p| (p, canonicalize_catalog(p)))
            .collect();
        let canonical_listings: Vec<(&CompetitorProduct, CanonicalProduct)> = listings
            .iter()
            .filter(|l| l.is_matchable())
            .map(|l| (l, canonicalize_competitor(l)))
            .collect();

        let mut outcome = RescanOutcome::default();

        for (product, canonical_product) in &canonical_catalog {
            for (listing, canonical_listing) in &canonical_listings {
                outcome.pairs_considered += 1;

                let pair = (product.id.clone(), listing.id.clone());
                if let Some(existing) = matches.get_active_pair(&pair) {
                    if existing.is_manual_match {
                        outcome.pinned += 1;
                        continue;
                    }
                }
                if blacklist.is_blacklisted(&product.id, &listing.id) {
                    outcome.blacklisted += 1;
                    continue;
                }
                if !self.scorer.plausible_pair(canonical_product, canonical_listing) {
                    outcome.pruned += 1;
                    continue;
                }

                let breakdown = self.scorer.score(canonical_product, canonical_listing);
                let confidence = self.scorer.confidence(breakdown.overall);
                if confidence == Confidence::Reject {
                    outcome.rejected += 1;
                    continue;
                }

                debug!(
                    catalog_product = %product.id,
                    competitor_product = %listing.id,
                    score = breakdown.overall,
                    %confidence,
                    "candidate match"
                );

                match matches.upsert_auto(
                    product.id.clone(),
                    listing.id.clone(),
                    listing.competitor_id,
                    breakdown.overall,
                    confidence,
                ) {
                    UpsertOutcome::Created => outcome.created += 1,
                    UpsertOutcome::Updated => outcome.updated += 1,
                    UpsertOutcome::SkippedPinned => outcome.pinned += 1,
                }
            }
        }

        info!(
            pairs = outcome.pairs_considered,
            created = outcome.created,
            updated = outcome.updated,
            pruned = outcome.pruned,
            blacklisted = outcome.blacklisted,
            "scoring pass complete"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingConfig;
    use crate::store::BlacklistStore;
    use crate::types::{BlacklistEntry, MatchState};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn engine() -> MatchEngine {
        MatchEngine::new(MatchScorer::new(MatchingConfig::default()))
    }

    fn catalog_product(id: &str, title: &str, vendor: &str, price: &str) -> CatalogProduct {
        CatalogProduct {
            id: id.to_string(),
            title: title.to_string(),
            vendor: vendor.to_string(),
            product_type: "Espresso Machines".to_string(),
            sku: None,
            price: dec(price),
            map_price: None,
        }
    }

    fn listing(id: &str, title: &str, price: Option<&str>) -> CompetitorProduct {
        let now = Utc::now();
        CompetitorProduct {
            id: id.to_string(),
            competitor_id: Uuid::new_v4(),
            title: title.to_string(),
            vendor: None,
            price: price.map(dec),
            sku: None,
            product_type: None,
            url: id.to_string(),
            first_seen_at: now,
            last_seen_at: now,
        }
    }

    #[test]
    fn rescan_emits_matching_candidates() {
        let catalog = vec![catalog_product("cp-1", "ECM Synchronika", "ECM", "3199.00")];
        let listings = vec![
            listing("url-1", "ECM Synchronika", Some("2999.00")),
            listing("url-2", "Baratza Encore Grinder", Some("169.00")),
        ];
        let matches = MatchStore::new();
        let blacklist = BlacklistStore::new();

        let outcome = engine().rescan(&catalog, &listings, &matches, &blacklist);
        assert_eq!(outcome.created, 1);
        assert_eq!(matches.active_count(), 1);
        let record = matches
            .get_active_pair(&("cp-1".to_string(), "url-1".to_string()))
            .unwrap();
        assert_eq!(record.state, MatchState::Pending);
        assert!(record.overall_score >= 0.60);
    }

    #[test]
    fn rescan_is_idempotent() {
        let catalog = vec![catalog_product("cp-1", "ECM Synchronika", "ECM", "3199.00")];
        let listings = vec![listing("url-1", "ECM Synchronika", Some("2999.00"))];
        let matches = MatchStore::new();
        let blacklist = BlacklistStore::new();
        let eng = engine();

        let first = eng.rescan(&catalog, &listings, &matches, &blacklist);
        assert_eq!(first.created, 1);
        let second = eng.rescan(&catalog, &listings, &matches, &blacklist);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 1);
        assert_eq!(matches.active_count(), 1);
    }

    #[test]
    fn rescan_never_emits_blacklisted_pairs() {
        let catalog = vec![catalog_product("cp-1", "ECM Synchronika", "ECM", "3199.00")];
        let listings = vec![listing("url-1", "ECM Synchronika", Some("2999.00"))];
        let matches = MatchStore::new();
        let blacklist = BlacklistStore::new();
        blacklist.insert(BlacklistEntry {
            catalog_product_id: "cp-1".to_string(),
            competitor_product_id: "url-1".to_string(),
            reason: None,
            created_at: Utc::now(),
        });

        let outcome = engine().rescan(&catalog, &listings, &matches, &blacklist);
        assert_eq!(outcome.blacklisted, 1);
        assert_eq!(outcome.created, 0);
        assert_eq!(matches.active_count(), 0);
    }

    #[test]
    fn rescan_skips_manual_matches_entirely() {
        let catalog = vec![catalog_product("cp-1", "ECM Synchronika", "ECM", "3199.00")];
        let listings = vec![listing("url-1", "ECM Synchronika", Some("2999.00"))];
        let matches = MatchStore::new();
        let blacklist = BlacklistStore::new();
        let eng = engine();

        eng.rescan(&catalog, &listings, &matches, &blacklist);
        let pair = ("cp-1".to_string(), "url-1".to_string());
        matches.update_in_place(&pair, |m| {
            m.state = MatchState::Manual;
            m.is_manual_match = true;
            m.overall_score = 1.0;
            m.confidence = Confidence::Manual;
        });

        let outcome = eng.rescan(&catalog, &listings, &matches, &blacklist);
        assert_eq!(outcome.pinned, 1);
        let record = matches.get_active_pair(&pair).unwrap();
        assert!((record.overall_score - 1.0).abs() < 1e-9);
        assert_eq!(record.confidence, Confidence::Manual);
    }

    #[test]
    fn rescan_excludes_unmatchable_listings() {
        let catalog = vec![catalog_product("cp-1", "ECM Synchronika", "ECM", "3199.00")];
        let listings = vec![listing("url-1", "ECM Synchronika", None)];
        let matches = MatchStore::new();
        let blacklist = BlacklistStore::new();

        let outcome = engine().rescan(&catalog, &listings, &matches, &blacklist);
        assert_eq!(outcome.pairs_considered, 0);
        assert_eq!(matches.active_count(), 0);
    }
}
