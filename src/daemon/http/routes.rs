//! HTTP API route definitions

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use super::auth::{auth_middleware, AuthState};
use super::handlers::{self, AppState};

/// Create the API router with all routes
pub fn create_router(app_state: AppState, auth_state: AuthState) -> Router {
    let api_v1 = Router::new()
        // Health check (no auth required)
        .route("/health", get(handlers::health))
        // Competitor configuration
        .route(
            "/competitors",
            get(handlers::list_competitors).post(handlers::upsert_competitor),
        )
        // Scrape jobs
        .route("/scraping/start-scrape", post(handlers::start_scrape))
        .route("/scraping/jobs/:job_id", get(handlers::job_progress))
        .route("/scraping/jobs/:job_id/cancel", post(handlers::cancel_job))
        // Matches
        .route("/matches", get(handlers::list_matches))
        .route("/matches/manual", post(handlers::create_manual_match))
        .route("/matches/rescan", post(handlers::rescan_matches))
        .route("/matches/:id/verify", post(handlers::verify_match))
        .route("/matches/:id/reject", post(handlers::reject_match))
        .route("/matches/:id", delete(handlers::delete_match))
        // Violations
        .route("/violations", get(handlers::list_violations))
        .route("/violations/scan", post(handlers::scan_violations))
        .route("/violations/statistics", get(handlers::violation_statistics))
        .route("/violations/export", get(handlers::export_violations))
        .route("/violations/:id/resolve", post(handlers::resolve_violation))
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            auth_middleware,
        ))
        .with_state(app_state);

    // Mount under /api/v1
    Router::new().nest("/api/v1", api_v1)
}
