//! HTTP API for mapwatch
//!
//! REST surface for competitor configuration, scrape jobs, match review, and
//! violation workflows, consumed by the operator dashboard.

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod types;

pub use handlers::AppState;
pub use server::HttpServer;
