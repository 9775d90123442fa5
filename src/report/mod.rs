//! Per-URL results and batch reports
//!
//! This module contains:
//! - [`UrlResult`], the terminal outcome of one URL
//! - [`BatchReport`] and the pure [`aggregate`] function that builds it
//! - Markdown rendering of reports

mod aggregate;
mod markdown;
pub(crate) mod millis;

pub use aggregate::aggregate;
pub use markdown::{format_markdown_summary, generate_markdown_summary};

use crate::analyze::AnalysisResult;
use crate::retry::FailureKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while writing reports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Terminal status of a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlStatus {
    Success,
    Error,
}

impl UrlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the per-URL pipeline a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    /// Waiting for an admission slot
    Admission,
    Fetch,
    Analysis,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Admission => "admission",
            Self::Fetch => "fetch",
            Self::Analysis => "analysis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
}

impl UrlFailure {
    pub fn new(stage: Stage, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for UrlFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.stage, self.kind, self.message)
    }
}

/// Success or failure; exactly one of the two, by construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UrlOutcome {
    Success { result: AnalysisResult },
    Error { error: UrlFailure },
}

/// Terminal outcome of one submitted URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlResult {
    /// The URL exactly as submitted
    pub url: String,

    #[serde(flatten)]
    pub outcome: UrlOutcome,

    /// Wall-clock time from admission to terminal state
    #[serde(rename = "duration_ms", with = "millis")]
    pub duration: Duration,

    /// Times the URL was tried: 1 plus every retry taken in either stage
    pub attempts: u32,

    pub fetch_attempts: u32,
    pub analyze_attempts: u32,
}

impl UrlResult {
    /// Builds a result, deriving `attempts` from the per-stage counters
    pub fn new(
        url: impl Into<String>,
        outcome: UrlOutcome,
        duration: Duration,
        fetch_attempts: u32,
        analyze_attempts: u32,
    ) -> Self {
        Self {
            url: url.into(),
            outcome,
            duration,
            attempts: total_attempts(fetch_attempts, analyze_attempts),
            fetch_attempts,
            analyze_attempts,
        }
    }

    /// A failure that happened before any stage ran
    pub fn rejected(url: impl Into<String>, failure: UrlFailure, duration: Duration) -> Self {
        Self::new(url, UrlOutcome::Error { error: failure }, duration, 0, 0)
    }

    pub fn status(&self) -> UrlStatus {
        match self.outcome {
            UrlOutcome::Success { .. } => UrlStatus::Success,
            UrlOutcome::Error { .. } => UrlStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == UrlStatus::Success
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.outcome {
            UrlOutcome::Success { result } => Some(result),
            UrlOutcome::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&UrlFailure> {
        match &self.outcome {
            UrlOutcome::Success { .. } => None,
            UrlOutcome::Error { error } => Some(error),
        }
    }
}

/// A URL counts as tried once when its fetch starts; every further call in
/// either stage is a retry.
fn total_attempts(fetch_attempts: u32, analyze_attempts: u32) -> u32 {
    if fetch_attempts == 0 {
        return 0;
    }
    fetch_attempts + analyze_attempts.saturating_sub(1)
}

/// One failed URL, as listed in a report's error section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub url: String,
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
}

/// Aggregate report of one batch
///
/// `results` is in submission order and has exactly `total` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,

    #[serde(rename = "duration_ms", with = "millis")]
    pub duration: Duration,

    pub results: Vec<UrlResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Category -> number of successful URLs in it
    pub category_distribution: BTreeMap<String, usize>,

    /// Mean quality over successes that reported a score
    pub average_quality_score: Option<f64>,

    pub errors: Vec<ErrorEntry>,
}

impl BatchReport {
    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / self.total as f64) * 100.0
    }

    /// Number of failures of the given kind
    pub fn count_kind(&self, kind: FailureKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }
}
