//! Violation handlers: listing, scan, resolution, statistics, export

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::catalog::CatalogProvider;
use crate::violations::{aggregate, export, StatisticsQuery, ViolationError};

use super::super::types::{
    ErrorResponse, ExportQuery, ListViolationsQuery, ResolveRequest, StatisticsParams,
};
use super::AppState;

fn parse_violation_id(id: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(id).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "INVALID_VIOLATION_ID",
                "Invalid violation ID format",
            )),
        )
            .into_response()
    })
}

/// List violations, optionally filtered by resolved state
pub async fn list_violations(
    State(state): State<AppState>,
    Query(query): Query<ListViolationsQuery>,
) -> impl IntoResponse {
    Json(state.violations.list(query.resolved))
}

/// Run the violation detector over the current match/price snapshot
pub async fn scan_violations(State(state): State<AppState>) -> impl IntoResponse {
    let outcome = state.detector.scan(
        &state.matches,
        state.catalog.as_ref(),
        &state.competitor_products,
        &state.violations,
    );
    Json(outcome)
}

/// Resolve an open violation
pub async fn resolve_violation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> impl IntoResponse {
    let id = match parse_violation_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if request.resolved_by.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("resolved_by is required")),
        )
            .into_response();
    }
    match state
        .detector
        .resolve(&state.violations, &id, request.resolved_by)
    {
        Ok(violation) => {
            info!(violation_id = %violation.id, by = ?violation.resolved_by, "violation resolved");
            (StatusCode::OK, Json(violation)).into_response()
        }
        Err(err @ ViolationError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("VIOLATION_NOT_FOUND", err.to_string())),
        )
            .into_response(),
    }
}

/// Trend aggregation over violations
pub async fn violation_statistics(
    State(state): State<AppState>,
    Query(params): Query<StatisticsParams>,
) -> impl IntoResponse {
    let query = StatisticsQuery {
        start_date: params.start_date,
        end_date: params.end_date,
        group_by: params.group_by.unwrap_or_default(),
        brand: params.brand,
        competitor_id: params.competitor,
    };
    let violations = state.violations.list(None);
    let catalog = state.catalog.clone();
    let vendor_of = move |id: &str| catalog.get(id).map(|p| p.vendor);
    let buckets = aggregate(&violations, &vendor_of, &query);
    Json(buckets)
}

/// Flat-file export of violations
pub async fn export_violations(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> impl IntoResponse {
    match query.format.as_deref().unwrap_or("csv") {
        "csv" => {
            let csv = export::to_csv(&state.violations.list(query.resolved));
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
                csv,
            )
                .into_response()
        }
        other => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request(format!(
                "Unsupported export format '{}'",
                other
            ))),
        )
            .into_response(),
    }
}
