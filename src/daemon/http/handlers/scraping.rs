//! Scrape job handlers: start, progress, cancel

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;
use uuid::Uuid;

use super::super::types::{ErrorResponse, JobCancelResponse, JobStartedResponse, StartScrapeRequest};
use super::AppState;

/// Parse a job id path parameter, or produce the error response.
fn parse_job_id(job_id: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(job_id).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("INVALID_JOB_ID", "Invalid job ID format")),
        )
            .into_response()
    })
}

/// Start a scrape job for one competitor
pub async fn start_scrape(
    State(state): State<AppState>,
    Json(request): Json<StartScrapeRequest>,
) -> impl IntoResponse {
    let Some(competitor) = state.competitors.get(&request.competitor_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "COMPETITOR_NOT_FOUND",
                format!("Competitor {} not found", request.competitor_id),
            )),
        )
            .into_response();
    };
    if !competitor.is_active {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(
                "COMPETITOR_INACTIVE",
                format!("Competitor '{}' is not active", competitor.name),
            )),
        )
            .into_response();
    }

    debug!(competitor = %competitor.name, "HTTP scrape start request");
    let job_id = state.jobs.start_scrape(competitor);
    (
        StatusCode::OK,
        Json(JobStartedResponse {
            job_id: job_id.to_string(),
            message: "Scrape job started".to_string(),
        }),
    )
        .into_response()
}

/// Poll job progress
pub async fn job_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.jobs.get(&job_id) {
        Some(job) => (StatusCode::OK, Json(job)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "JOB_NOT_FOUND",
                format!("Job {} not found", job_id),
            )),
        )
            .into_response(),
    }
}

/// Cancel a running job
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if !state.jobs.exists(&job_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "JOB_NOT_FOUND",
                format!("Job {} not found", job_id),
            )),
        )
            .into_response();
    }
    let cancelled = state.jobs.cancel(&job_id);
    (
        StatusCode::OK,
        Json(JobCancelResponse {
            success: cancelled,
            message: if cancelled {
                "Job cancelled".to_string()
            } else {
                "Job already finished".to_string()
            },
        }),
    )
        .into_response()
}
