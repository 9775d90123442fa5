//! Semantic analysis
//!
//! Defines the [`SemanticAnalyzer`] seam the pipeline calls once a page has
//! been fetched, the option and result types that cross it, and an
//! implementation backed by an OpenAI-compatible chat-completions service.

mod client;
mod prompt;
mod types;

pub use client::LlmAnalyzer;
pub use prompt::{build_user_prompt, system_prompt};
pub use types::{
    AnalysisDepth, AnalysisOptions, AnalysisResult, Entity, Sentiment, SentimentLabel,
};

use crate::fetch::PageMetadata;
use crate::retry::FailureKind;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Everything the analyzer gets to see about one page
#[derive(Debug, Clone, Copy)]
pub struct AnalysisInput<'a> {
    pub url: &'a Url,
    /// Page text, already cut to the configured maximum length
    pub text: &'a str,
    pub title: Option<&'a str>,
    pub language: Option<&'a str>,
    pub metadata: &'a PageMetadata,
    /// True when `text` was shortened before analysis
    pub truncated: bool,
}

/// A failed analysis, classified for the retry policy
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("analysis failed ({kind}): {message}")]
pub struct AnalysisFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Delay requested by the service when rate limiting
    pub retry_after: Option<Duration>,
}

impl AnalysisFailure {
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

/// Produces a structured analysis of page text
///
/// Rate limiting must be reported as [`FailureKind::RateLimited`] so the
/// pipeline can back off accordingly.
#[async_trait]
pub trait SemanticAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        input: &AnalysisInput<'_>,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult, AnalysisFailure>;
}
