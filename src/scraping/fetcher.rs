//! Page fetching for competitor scraping
//!
//! The rest of the pipeline treats fetching as an opaque capability behind
//! the `PageFetcher` trait: given a URL, return the raw body or a fetch
//! error. `HttpFetcher` is the production implementation on reqwest; tests
//! inject an in-memory fetcher with canned pages.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    #[error("Content too large: {0} bytes")]
    ContentTooLarge(usize),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Not found")]
    NotFound,
}

impl FetchError {
    /// Whether the error points at the whole site being unreachable rather
    /// than a single page being bad.
    pub fn is_unreachable(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_connect() || e.is_timeout(),
            FetchError::Timeout(_) => true,
            _ => false,
        }
    }
}

/// Result of a successful fetch
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The fetched URL (may differ from the request due to redirects)
    pub url: Url,
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Time taken to fetch
    pub fetch_duration: Duration,
}

impl FetchedPage {
    pub fn is_json(&self) -> bool {
        self.content_type.contains("json")
            || self.body.trim_start().starts_with('{')
            || self.body.trim_start().starts_with('[')
    }

    pub fn is_html(&self) -> bool {
        self.content_type.contains("text/html")
    }
}

/// Opaque page-fetch capability
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// Configuration for the HTTP fetcher
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string
    pub user_agent: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Maximum response size (bytes)
    pub max_content_size: usize,
    /// Maximum redirects to follow
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "mapwatch-bot/0.1".to_string(),
            timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            max_content_size: 5 * 1024 * 1024, // 5 MB
            max_redirects: 10,
        }
    }
}

impl FetchConfig {
    /// Build from the scraping section of the main configuration.
    pub fn from_config(config: &crate::config::ScrapingConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            max_content_size: config.max_content_size,
            max_redirects: 10,
        }
    }
}

/// Production fetcher on a pooled reqwest client
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let start = Instant::now();

        let response = self.client.get(url.as_str()).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.config.timeout)
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        if let Some(len) = response.content_length() {
            if len as usize > self.config.max_content_size {
                return Err(FetchError::ContentTooLarge(len as usize));
            }
        }

        let body = response.text().await?;
        if body.len() > self.config.max_content_size {
            return Err(FetchError::ContentTooLarge(body.len()));
        }

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
            content_type,
            fetch_duration: start.elapsed(),
        })
    }
}
