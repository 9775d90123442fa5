//! Content fetching
//!
//! This module contains:
//! - The [`ContentFetcher`] seam the pipeline calls for every URL
//! - An HTTP implementation built on reqwest
//! - HTML text and metadata extraction

mod extract;
mod http;

pub use extract::{extract_page, ExtractedPage};
pub use http::{build_http_client, HttpFetcher};

use crate::retry::FailureKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Content of a successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedContent {
    /// Cleaned page text, ready for analysis
    pub raw_text: String,

    /// Page title (if any)
    pub title: Option<String>,

    /// Declared page language (from `<html lang>`)
    pub language: Option<String>,

    /// When the response was received
    pub fetched_at: DateTime<Utc>,

    /// Everything else known about the page
    pub metadata: PageMetadata,
}

impl FetchedContent {
    /// Builds content from plain text with empty metadata
    pub fn from_text(text: impl Into<String>) -> Self {
        let raw_text = text.into();
        Self {
            metadata: PageMetadata {
                word_count: raw_text.split_whitespace().count(),
                ..PageMetadata::default()
            },
            raw_text,
            title: None,
            language: None,
            fetched_at: Utc::now(),
        }
    }
}

/// Page metadata gathered while fetching
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMetadata {
    pub final_url: Option<String>,
    pub content_type: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub author: Option<String>,
    pub word_count: usize,
    pub reading_time_minutes: usize,
}

/// A failed fetch, classified for the retry policy
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("fetch failed ({kind}): {message}")]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Delay requested by the server, if it sent one
    pub retry_after: Option<Duration>,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Permanent, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transient, message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            kind: FailureKind::RateLimited,
            message: message.into(),
            retry_after,
        }
    }
}

/// Retrieves page content for a URL
///
/// Implementations must be safe to drop mid-flight: the pipeline cancels an
/// in-progress fetch by dropping its future when the batch deadline expires.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedContent, FetchFailure>;
}
