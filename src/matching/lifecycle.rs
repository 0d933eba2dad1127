//! Match lifecycle management
//!
//! Owns the state machine over product matches. All transitions are
//! synchronous, single-writer-per-match operations, and no transition leaves
//! an orphaned violation pointing at a removed match.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::store::{BlacklistStore, MatchStore, ViolationStore};
use crate::types::{
    BlacklistEntry, CatalogProductId, CompetitorProduct, Confidence, MatchId, MatchState,
    ProductMatch,
};

/// Errors surfaced by lifecycle transitions
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("match {0} not found")]
    NotFound(MatchId),
    #[error("cannot {action} a match in state {state}")]
    InvalidTransition {
        action: &'static str,
        state: MatchState,
    },
    #[error(
        "pair ({catalog_product_id}, {competitor_product_id}) is blacklisted; \
         remove the blacklist entry first"
    )]
    PairBlacklisted {
        catalog_product_id: String,
        competitor_product_id: String,
    },
}

/// Applies operator actions to matches, cascading to the blacklist and to
/// open violations as the transitions require.
pub struct MatchLifecycle {
    matches: Arc<MatchStore>,
    blacklist: Arc<BlacklistStore>,
    violations: Arc<ViolationStore>,
}

impl MatchLifecycle {
    pub fn new(
        matches: Arc<MatchStore>,
        blacklist: Arc<BlacklistStore>,
        violations: Arc<ViolationStore>,
    ) -> Self {
        Self {
            matches,
            blacklist,
            violations,
        }
    }

    /// Operator "Verify": confirm an auto match. The match becomes
    /// equivalent to a manual one (pinned at score 1.0); an open violation
    /// tied to it is left untouched.
    pub fn verify(&self, id: &MatchId) -> Result<ProductMatch, MatchError> {
        let current = self.matches.get(id).ok_or(MatchError::NotFound(*id))?;
        if current.state != MatchState::Pending {
            return Err(MatchError::InvalidTransition {
                action: "verify",
                state: current.state,
            });
        }
        self.matches
            .update_in_place(&current.pair(), |m| {
                m.state = MatchState::Verified;
                m.is_manual_match = true;
                m.overall_score = 1.0;
                m.confidence = Confidence::Manual;
            })
            .ok_or(MatchError::NotFound(*id))
    }

    /// Operator "Unmatch": reject the match, blacklist the pair so it is
    /// never auto-matched again, and close any open violation tied to it.
    pub fn reject(&self, id: &MatchId, reason: Option<String>) -> Result<ProductMatch, MatchError> {
        let retired = self
            .matches
            .retire(id, MatchState::Rejected)
            .ok_or(MatchError::NotFound(*id))?;
        self.blacklist.insert(BlacklistEntry {
            catalog_product_id: retired.catalog_product_id.clone(),
            competitor_product_id: retired.competitor_product_id.clone(),
            reason,
            created_at: Utc::now(),
        });
        self.violations.close_for_match(&retired.id, None);
        Ok(retired)
    }

    /// Operator "Delete": remove the match without blacklisting; the pair
    /// may be re-matched by a later scoring pass. Any open violation tied to
    /// it is closed.
    pub fn delete(&self, id: &MatchId) -> Result<ProductMatch, MatchError> {
        let retired = self
            .matches
            .retire(id, MatchState::Deleted)
            .ok_or(MatchError::NotFound(*id))?;
        self.violations.close_for_match(&retired.id, None);
        Ok(retired)
    }

    /// Operator-created match, bypassing scoring. Rejected when the pair is
    /// blacklisted. When an auto match already holds the pair slot the
    /// existing record is converted in place rather than duplicated.
    pub fn create_manual(
        &self,
        catalog_product_id: CatalogProductId,
        listing: &CompetitorProduct,
    ) -> Result<ProductMatch, MatchError> {
        if self
            .blacklist
            .contains(&catalog_product_id, &listing.id)
        {
            return Err(MatchError::PairBlacklisted {
                catalog_product_id,
                competitor_product_id: listing.id.clone(),
            });
        }

        let pair = (catalog_product_id.clone(), listing.id.clone());
        if let Some(existing) = self.matches.get_active_pair(&pair) {
            return self
                .matches
                .update_in_place(&pair, |m| {
                    m.state = MatchState::Manual;
                    m.is_manual_match = true;
                    m.overall_score = 1.0;
                    m.confidence = Confidence::Manual;
                })
                .ok_or(MatchError::NotFound(existing.id));
        }

        let now = Utc::now();
        let record = ProductMatch {
            id: Uuid::new_v4(),
            catalog_product_id,
            competitor_product_id: listing.id.clone(),
            competitor_id: listing.competitor_id,
            overall_score: 1.0,
            confidence: Confidence::Manual,
            is_manual_match: true,
            state: MatchState::Manual,
            created_at: now,
            updated_at: now,
        };
        self.matches.insert(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    struct Fixture {
        matches: Arc<MatchStore>,
        blacklist: Arc<BlacklistStore>,
        violations: Arc<ViolationStore>,
        lifecycle: MatchLifecycle,
    }

    fn fixture() -> Fixture {
        let matches = Arc::new(MatchStore::new());
        let blacklist = Arc::new(BlacklistStore::new());
        let violations = Arc::new(ViolationStore::new());
        let lifecycle = MatchLifecycle::new(
            Arc::clone(&matches),
            Arc::clone(&blacklist),
            Arc::clone(&violations),
        );
        Fixture {
            matches,
            blacklist,
            violations,
            lifecycle,
        }
    }

    fn seed_auto_match(fx: &Fixture) -> ProductMatch {
        fx.matches.upsert_auto(
            "cp-1".to_string(),
            "url-1".to_string(),
            Uuid::new_v4(),
            0.82,
            Confidence::High,
        );
        fx.matches
            .get_active_pair(&("cp-1".to_string(), "url-1".to_string()))
            .unwrap()
    }

    fn listing(id: &str) -> CompetitorProduct {
        let now = Utc::now();
        CompetitorProduct {
            id: id.to_string(),
            competitor_id: Uuid::new_v4(),
            title: "ECM Synchronika".to_string(),
            vendor: None,
            price: Some(dec("2999.00")),
            sku: None,
            product_type: None,
            url: id.to_string(),
            first_seen_at: now,
            last_seen_at: now,
        }
    }

    fn open_violation(fx: &Fixture, match_id: MatchId) {
        let now = Utc::now();
        fx.violations.upsert_open(crate::types::Violation {
            id: Uuid::new_v4(),
            match_id,
            catalog_product_id: "cp-1".to_string(),
            competitor_product_id: "url-1".to_string(),
            competitor_id: Uuid::new_v4(),
            reference_price: dec("100.00"),
            observed_price: dec("75.00"),
            price_delta: dec("25.00"),
            violation_percent: 0.25,
            severity: Severity::Severe,
            resolved: false,
            resolved_by: None,
            resolved_at: None,
            detected_at: now,
            updated_at: now,
        });
    }

    #[test]
    fn verify_pins_the_match() {
        let fx = fixture();
        let record = seed_auto_match(&fx);

        let verified = fx.lifecycle.verify(&record.id).unwrap();
        assert_eq!(verified.state, MatchState::Verified);
        assert!(verified.is_manual_match);
        assert!((verified.overall_score - 1.0).abs() < 1e-9);
        assert_eq!(verified.confidence, Confidence::Manual);
    }

    #[test]
    fn verify_leaves_open_violation_untouched() {
        let fx = fixture();
        let record = seed_auto_match(&fx);
        open_violation(&fx, record.id);

        fx.lifecycle.verify(&record.id).unwrap();
        assert!(fx.violations.open_for_match(&record.id).is_some());
    }

    #[test]
    fn verify_requires_pending_state() {
        let fx = fixture();
        let record = seed_auto_match(&fx);
        fx.lifecycle.verify(&record.id).unwrap();

        let err = fx.lifecycle.verify(&record.id).unwrap_err();
        assert!(matches!(
            err,
            MatchError::InvalidTransition {
                action: "verify",
                state: MatchState::Verified
            }
        ));
    }

    #[test]
    fn reject_blacklists_and_closes_violation() {
        let fx = fixture();
        let record = seed_auto_match(&fx);
        open_violation(&fx, record.id);

        let rejected = fx
            .lifecycle
            .reject(&record.id, Some("wrong variant".to_string()))
            .unwrap();
        assert_eq!(rejected.state, MatchState::Rejected);
        assert!(fx.blacklist.contains("cp-1", "url-1"));
        assert_eq!(fx.blacklist.len(), 1);
        assert!(fx.violations.open_for_match(&record.id).is_none());
        assert!(fx.matches.get(&record.id).is_none());
    }

    #[test]
    fn delete_closes_violation_without_blacklisting() {
        let fx = fixture();
        let record = seed_auto_match(&fx);
        open_violation(&fx, record.id);

        let deleted = fx.lifecycle.delete(&record.id).unwrap();
        assert_eq!(deleted.state, MatchState::Deleted);
        assert!(fx.blacklist.is_empty());
        assert!(fx.violations.open_for_match(&record.id).is_none());
    }

    #[test]
    fn transitions_on_missing_match_are_not_found() {
        let fx = fixture();
        let missing = Uuid::new_v4();
        assert!(matches!(
            fx.lifecycle.verify(&missing),
            Err(MatchError::NotFound(_))
        ));
        assert!(matches!(
            fx.lifecycle.reject(&missing, None),
            Err(MatchError::NotFound(_))
        ));
        assert!(matches!(
            fx.lifecycle.delete(&missing),
            Err(MatchError::NotFound(_))
        ));
    }

    #[test]
    fn manual_create_replaces_existing_auto_match() {
        let fx = fixture();
        let record = seed_auto_match(&fx);

        let manual = fx
            .lifecycle
            .create_manual("cp-1".to_string(), &listing("url-1"))
            .unwrap();
        assert_eq!(manual.id, record.id, "record replaced in place, not duplicated");
        assert_eq!(manual.state, MatchState::Manual);
        assert!((manual.overall_score - 1.0).abs() < 1e-9);
        assert_eq!(fx.matches.active_count(), 1);
    }

    #[test]
    fn manual_create_on_blacklisted_pair_is_rejected() {
        let fx = fixture();
        let record = seed_auto_match(&fx);
        fx.lifecycle.reject(&record.id, None).unwrap();

        let err = fx
            .lifecycle
            .create_manual("cp-1".to_string(), &listing("url-1"))
            .unwrap_err();
        assert!(matches!(err, MatchError::PairBlacklisted { .. }));
        assert!(err.to_string().contains("cp-1"));
    }

    #[test]
    fn manual_create_fresh_pair() {
        let fx = fixture();
        let manual = fx
            .lifecycle
            .create_manual("cp-9".to_string(), &listing("url-9"))
            .unwrap();
        assert_eq!(manual.state, MatchState::Manual);
        assert!(manual.is_manual_match);
        assert_eq!(fx.matches.active_count(), 1);
    }
}
