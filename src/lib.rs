//! Sumi-Lens: bulk semantic analysis of web pages
//!
//! This crate takes a list of URLs, fetches each page, sends its text to a
//! language-model analysis service and assembles a deterministic batch report.
//! The heart of it is the bounded-concurrency orchestrator in [`pipeline`].

pub mod analyze;
pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Lens operations
///
/// Per-URL failures never show up here; they are recorded in the
/// [`report::UrlResult`] of the URL that failed.
#[derive(Debug, Error)]
pub enum LensError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] report::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Batch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Sumi-Lens operations
pub type Result<T> = std::result::Result<T, LensError>;

// Re-export commonly used types
pub use analyze::{AnalysisOptions, AnalysisResult, SemanticAnalyzer};
pub use config::Config;
pub use fetch::{ContentFetcher, FetchedContent};
pub use pipeline::{
    BatchHandle, BatchOrchestrator, BatchProgress, BatchSettings, ConcurrencyLimiter, UrlPipeline,
};
pub use report::{aggregate, BatchReport, UrlResult, UrlStatus};
pub use retry::{FailureKind, RetryDecision, RetryPolicy};
