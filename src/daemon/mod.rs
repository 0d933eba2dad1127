//! Long-running daemon: background scrape jobs and the HTTP API

pub mod http;
pub mod jobs;

pub use http::{AppState, HttpServer};
pub use jobs::{JobInfo, JobManager, JobState};
