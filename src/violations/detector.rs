//! MAP violation detection
//!
//! Scans the active matches against current prices, computing how far each
//! competitor price sits below the MAP floor and maintaining the open
//! violation set: one open violation per match, updated in place, closed
//! when the condition clears. Scanning is idempotent; running twice on an
//! unchanged snapshot yields no net change.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::CatalogProvider;
use crate::config::ViolationsConfig;
use crate::store::{CompetitorProductStore, MatchStore, ViolationStore};
use crate::types::{Severity, Violation, ViolationId};

/// Errors from operator violation actions
#[derive(Debug, Error)]
pub enum ViolationError {
    #[error("violation {0} not found or already resolved")]
    NotFound(ViolationId),
}

/// Aggregate result of one detection scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    /// Active matches examined
    pub matches_scanned: usize,
    /// New violations opened
    pub created: usize,
    /// Open violations refreshed in place
    pub updated: usize,
    /// Open violations closed because the condition cleared
    pub closed: usize,
    /// Matches skipped because a referenced product or price is gone
    pub skipped: usize,
}

/// Computes violations from matches plus current prices
pub struct ViolationDetector {
    config: ViolationsConfig,
}

impl ViolationDetector {
    pub fn new(config: ViolationsConfig) -> Self {
        Self { config }
    }

    /// Classify a percent-below-MAP value, or None when it is below the
    /// materiality floor (including non-violations at or above the floor
    /// price).
    pub fn classify(&self, violation_percent: f64) -> Option<Severity> {
        if violation_percent >= self.config.severe_threshold {
            Some(Severity::Severe)
        } else if violation_percent >= self.config.moderate_threshold {
            Some(Severity::Moderate)
        } else if violation_percent >= self.config.minor_threshold {
            Some(Severity::Minor)
        } else {
            None
        }
    }

    /// Scan all active matches, opening/updating/closing violations.
    pub fn scan(
        &self,
        matches: &MatchStore,
        catalog: &dyn CatalogProvider,
        products: &CompetitorProductStore,
        violations: &ViolationStore,
    ) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();

        for record in matches.active_matches() {
            outcome.matches_scanned += 1;

            let Some(catalog_product) = catalog.get(&record.catalog_product_id) else {
                // Product left the feed; any open violation no longer applies
                if violations.close_for_match(&record.id, None).is_some() {
                    outcome.closed += 1;
                }
                outcome.skipped += 1;
                continue;
            };
            let observed = products
                .get(&record.competitor_product_id)
                .and_then(|listing| listing.price);
            let Some(observed) = observed else {
                if violations.close_for_match(&record.id, None).is_some() {
                    outcome.closed += 1;
                }
                outcome.skipped += 1;
                continue;
            };

            let floor = catalog_product.map_floor();
            if floor <= Decimal::ZERO {
                outcome.skipped += 1;
                continue;
            }

            let violation_percent = ((floor - observed) / floor).to_f64().unwrap_or(0.0);

            match self.classify(violation_percent) {
                Some(severity) => {
                    let now = Utc::now();
                    let violation = Violation {
                        id: Uuid::new_v4(),
                        match_id: record.id,
                        catalog_product_id: record.catalog_product_id.clone(),
                        competitor_product_id: record.competitor_product_id.clone(),
                        competitor_id: record.competitor_id,
                        reference_price: floor,
                        observed_price: observed,
                        price_delta: floor - observed,
                        violation_percent,
                        severity,
                        resolved: false,
                        resolved_by: None,
                        resolved_at: None,
                        detected_at: now,
                        updated_at: now,
                    };
                    debug!(
                        match_id = %record.id,
                        %severity,
                        percent = violation_percent,
                        "violation detected"
                    );
                    if violations.upsert_open(violation) {
                        outcome.created += 1;
                    } else {
                        outcome.updated += 1;
                    }
                }
                None => {
                    if violations.close_for_match(&record.id, None).is_some() {
                        outcome.closed += 1;
                    }
                }
            }
        }

        info!(
            scanned = outcome.matches_scanned,
            created = outcome.created,
            updated = outcome.updated,
            closed = outcome.closed,
            "violation scan complete"
        );
        outcome
    }

    /// Operator resolution. The match is untouched; a later scan may open a
    /// new violation instance if the condition recurs.
    pub fn resolve(
        &self,
        violations: &ViolationStore,
        id: &ViolationId,
        resolved_by: String,
    ) -> Result<Violation, ViolationError> {
        violations
            .resolve(id, resolved_by)
            .ok_or(ViolationError::NotFound(*id))
    }
}
