//! Competitor configuration handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::info;
use uuid::Uuid;

use crate::types::{Competitor, ScrapingStrategy};

use super::super::types::{CompetitorRequest, ErrorResponse};
use super::AppState;

/// List all monitored competitors
pub async fn list_competitors(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.competitors.list())
}

/// Create or update a competitor configuration (upsert keyed by domain)
pub async fn upsert_competitor(
    State(state): State<AppState>,
    Json(request): Json<CompetitorRequest>,
) -> impl IntoResponse {
    if request.name.trim().is_empty() || request.domain.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("name and domain are required")),
        )
            .into_response();
    }
    if strategy_is_empty(&request.strategy) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request(
                "strategy parameters must not be empty",
            )),
        )
            .into_response();
    }

    let stored = state.competitors.upsert(Competitor {
        id: Uuid::new_v4(),
        name: request.name.trim().to_string(),
        domain: request.domain.trim().to_string(),
        strategy: request.strategy,
        exclude_patterns: request.exclude_patterns,
        is_active: request.is_active,
        last_scraped_at: None,
    });

    info!(competitor = %stored.name, domain = %stored.domain, "competitor upserted");
    (StatusCode::OK, Json(stored)).into_response()
}

fn strategy_is_empty(strategy: &ScrapingStrategy) -> bool {
    match strategy {
        ScrapingStrategy::Collections { collections } => collections.is_empty(),
        ScrapingStrategy::UrlPatterns { patterns } => patterns.is_empty(),
        ScrapingStrategy::SearchTerms { terms } => terms.is_empty(),
    }
}
