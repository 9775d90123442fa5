//! HTTP fetcher implementation
//!
//! This module handles all page requests for the analyzer, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - GET requests with redirect following
//! - Content-Type checks
//! - Error classification for the retry policy

use crate::config::FetcherConfig;
use crate::fetch::{extract_page, ContentFetcher, FetchFailure, FetchedContent};
use crate::retry::{classify_http_status, parse_retry_after};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use sumi_lens::config::FetcherConfig;
/// use sumi_lens::fetch::build_http_client;
///
/// let client = build_http_client(&FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages over HTTP(S) and reduces them to analyzable text
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Wraps an existing client (shared connection pool, custom settings)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    /// Fetches a URL and classifies any failure
    ///
    /// | Condition | Kind |
    /// |-----------|------|
    /// | HTTP 429 | RateLimited (with Retry-After) |
    /// | HTTP 408, 5xx | Transient |
    /// | Other HTTP 4xx | Permanent |
    /// | Non-text Content-Type | Permanent |
    /// | Timeout / connection / body error | Transient |
    async fn fetch(&self, url: &Url) -> Result<FetchedContent, FetchFailure> {
        let response = self
            .client
            .get(url.as_str())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,text/plain;q=0.9,*/*;q=0.5",
            )
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(status_failure(status, response.headers()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());

        let is_html = match content_type.as_deref() {
            None => true,
            Some(ct) if ct.contains("text/html") || ct.contains("application/xhtml+xml") => true,
            Some(ct) if ct.contains("text/plain") => false,
            Some(ct) => {
                return Err(FetchFailure::permanent(format!(
                    "unsupported content type: {}",
                    ct
                )))
            }
        };

        let body = response.text().await.map_err(classify_request_error)?;
        let fetched_at = Utc::now();

        let content = if is_html {
            let page = extract_page(&body);
            let mut metadata = page.metadata;
            metadata.final_url = Some(final_url);
            metadata.content_type = content_type;
            FetchedContent {
                raw_text: page.text,
                title: page.title,
                language: page.language,
                fetched_at,
                metadata,
            }
        } else {
            let mut content = FetchedContent::from_text(body.split_whitespace().collect::<Vec<_>>().join(" "));
            content.fetched_at = fetched_at;
            content.metadata.final_url = Some(final_url);
            content.metadata.content_type = content_type;
            content
        };

        tracing::debug!(
            "Fetched {} ({} words)",
            url,
            content.metadata.word_count
        );

        Ok(content)
    }
}

fn status_failure(status: StatusCode, headers: &reqwest::header::HeaderMap) -> FetchFailure {
    let kind = classify_http_status(status.as_u16());
    let reason = status.canonical_reason().unwrap_or("unknown status");
    let message = match status.as_u16() {
        403 => format!("HTTP 403: {} - website blocked automated access", reason),
        404 => format!("HTTP 404: {} - URL does not exist", reason),
        429 => format!("HTTP 429: {} - rate limited", reason),
        code => format!("HTTP {}: {}", code, reason),
    };

    FetchFailure {
        kind,
        message,
        retry_after: parse_retry_after(headers),
    }
}

fn classify_request_error(e: reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::transient("request timeout")
    } else if e.is_connect() {
        FetchFailure::transient(format!("connection failed: {}", e))
    } else if e.is_redirect() {
        FetchFailure::permanent(format!("redirect error: {}", e))
    } else if e.is_builder() {
        FetchFailure::permanent(format!("invalid request: {}", e))
    } else {
        FetchFailure::transient(e.to_string())
    }
}
