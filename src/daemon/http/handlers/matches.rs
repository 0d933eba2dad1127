//! Match handlers: listing, manual creation, lifecycle actions, rescan

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::CatalogProvider;
use crate::matching::MatchError;

use super::super::types::{
    ErrorResponse, ListMatchesQuery, ManualMatchRequest, MatchesPageResponse, RejectRequest,
};
use super::AppState;

/// Cap on per_page to keep responses bounded
const MAX_PER_PAGE: usize = 200;

fn parse_match_id(id: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(id).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("INVALID_MATCH_ID", "Invalid match ID format")),
        )
            .into_response()
    })
}

fn match_error_response(err: MatchError) -> Response {
    let (status, code) = match &err {
        MatchError::NotFound(_) => (StatusCode::NOT_FOUND, "MATCH_NOT_FOUND"),
        MatchError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
        MatchError::PairBlacklisted { .. } => (StatusCode::CONFLICT, "PAIR_BLACKLISTED"),
    };
    (status, Json(ErrorResponse::new(code, err.to_string()))).into_response()
}

/// Paginated match listing
pub async fn list_matches(
    State(state): State<AppState>,
    Query(query): Query<ListMatchesQuery>,
) -> impl IntoResponse {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, MAX_PER_PAGE);
    let (matches, total) = state.matches.list_page(query.state, page, per_page);
    Json(MatchesPageResponse {
        matches,
        page,
        per_page,
        total,
    })
}

/// Create a manual match between a catalog product and a competitor listing
pub async fn create_manual_match(
    State(state): State<AppState>,
    Json(request): Json<ManualMatchRequest>,
) -> impl IntoResponse {
    if state.catalog.get(&request.catalog_id).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "CATALOG_PRODUCT_NOT_FOUND",
                format!("Catalog product '{}' not found", request.catalog_id),
            )),
        )
            .into_response();
    }
    let Some(listing) = state.competitor_products.get(&request.competitor_product_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "COMPETITOR_PRODUCT_NOT_FOUND",
                format!(
                    "Competitor product '{}' not found",
                    request.competitor_product_id
                ),
            )),
        )
            .into_response();
    };

    match state.lifecycle.create_manual(request.catalog_id, &listing) {
        Ok(record) => {
            info!(match_id = %record.id, "manual match created");
            (StatusCode::OK, Json(record)).into_response()
        }
        Err(err) => match_error_response(err),
    }
}

/// Operator "Verify" on an auto match
pub async fn verify_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match parse_match_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.lifecycle.verify(&id) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => match_error_response(err),
    }
}

/// Operator "Unmatch": reject and blacklist the pair
pub async fn reject_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<RejectRequest>>,
) -> impl IntoResponse {
    let id = match parse_match_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let reason = body.and_then(|Json(r)| r.reason);
    match state.lifecycle.reject(&id, reason) {
        Ok(record) => {
            info!(match_id = %record.id, "match rejected and pair blacklisted");
            (StatusCode::OK, Json(record)).into_response()
        }
        Err(err) => match_error_response(err),
    }
}

/// Operator "Delete": remove without blacklisting
pub async fn delete_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match parse_match_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.lifecycle.delete(&id) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => match_error_response(err),
    }
}

/// Run the scoring pass over the current catalog and scraped listings
pub async fn rescan_matches(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.catalog.products();
    let listings = state.competitor_products.all();
    debug!(
        catalog = catalog.len(),
        listings = listings.len(),
        "HTTP rescan request"
    );
    let outcome = state
        .engine
        .rescan(&catalog, &listings, &state.matches, state.blacklist.as_ref());
    Json(outcome)
}
