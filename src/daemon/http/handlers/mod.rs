//! HTTP API request handlers

mod competitors;
mod matches;
mod scraping;
mod system;
mod violations;

use std::sync::Arc;

use crate::catalog::CatalogProvider;
use crate::daemon::jobs::JobManager;
use crate::matching::{MatchEngine, MatchLifecycle};
use crate::store::{
    BlacklistStore, CompetitorProductStore, CompetitorStore, MatchStore, ViolationStore,
};
use crate::violations::ViolationDetector;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub competitors: Arc<CompetitorStore>,
    pub competitor_products: Arc<CompetitorProductStore>,
    pub matches: Arc<MatchStore>,
    pub blacklist: Arc<BlacklistStore>,
    pub violations: Arc<ViolationStore>,
    pub catalog: Arc<dyn CatalogProvider>,
    pub lifecycle: Arc<MatchLifecycle>,
    pub engine: Arc<MatchEngine>,
    pub detector: Arc<ViolationDetector>,
    pub jobs: Arc<JobManager>,
}

// Re-export all handlers
pub use competitors::{list_competitors, upsert_competitor};
pub use matches::{
    create_manual_match, delete_match, list_matches, reject_match, rescan_matches, verify_match,
};
pub use scraping::{cancel_job, job_progress, start_scrape};
pub use system::health;
pub use violations::{
    export_violations, list_violations, resolve_violation, scan_violations, violation_statistics,
};
