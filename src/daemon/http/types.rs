//! HTTP API request/response types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{MatchState, ProductMatch, ScrapingStrategy};
use crate::violations::GroupBy;

/// Create/update competitor request body
#[derive(Debug, Clone, Deserialize)]
pub struct CompetitorRequest {
    pub name: String,
    pub domain: String,
    #[serde(flatten)]
    pub strategy: ScrapingStrategy,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Start-scrape request body
#[derive(Debug, Clone, Deserialize)]
pub struct StartScrapeRequest {
    pub competitor_id: Uuid,
}

/// Response for a started job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStartedResponse {
    pub job_id: String,
    pub message: String,
}

/// Response for a job cancel request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCancelResponse {
    pub success: bool,
    pub message: String,
}

/// Query parameters for the paginated match listing
#[derive(Debug, Clone, Deserialize)]
pub struct ListMatchesQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    #[serde(default)]
    pub state: Option<MatchState>,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    50
}

/// One page of matches
#[derive(Debug, Clone, Serialize)]
pub struct MatchesPageResponse {
    pub matches: Vec<ProductMatch>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

/// Manual match creation request body
#[derive(Debug, Clone, Deserialize)]
pub struct ManualMatchRequest {
    pub catalog_id: String,
    pub competitor_product_id: String,
}

/// Match rejection request body
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Violation resolution request body
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveRequest {
    pub resolved_by: String,
}

/// Query parameters for the violation listing
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListViolationsQuery {
    #[serde(default)]
    pub resolved: Option<bool>,
}

/// Query parameters for violation statistics
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StatisticsParams {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub group_by: Option<GroupBy>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub competitor: Option<Uuid>,
}

/// Query parameters for the violation export
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub resolved: Option<bool>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "Invalid or missing API key")
    }
}
