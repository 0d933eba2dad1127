//! System handlers

use axum::{response::IntoResponse, Json};

use super::super::types::HealthResponse;

/// Health check (unauthenticated)
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
