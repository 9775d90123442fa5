//! Classify HTTP responses and failures into retry policy kinds.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Classification of a failure, shared by fetch and analysis stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rejected before any work started (bad URL syntax)
    InvalidInput,
    /// Will not succeed on retry (4xx other than 429, unsupported content)
    Permanent,
    /// May succeed on retry (network timeout, connection reset, 5xx)
    Transient,
    /// The remote service asked us to slow down (429)
    RateLimited,
    /// The batch deadline expired before the URL reached a terminal state
    Timeout,
}

impl FailureKind {
    /// Returns true if a failure of this kind is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::RateLimited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Permanent => "permanent",
            Self::Transient => "transient",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "invalid_input" => Some(Self::InvalidInput),
            "permanent" => Some(Self::Permanent),
            "transient" => Some(Self::Transient),
            "rate_limited" => Some(Self::RateLimited),
            "timeout" => Some(Self::Timeout),
            _ => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a non-success HTTP status code for retry decisions.
pub fn classify_http_status(code: u16) -> FailureKind {
    match code {
        429 => FailureKind::RateLimited,
        408 | 500..=599 => FailureKind::Transient,
        _ => FailureKind::Permanent,
    }
}

/// Reads the server's requested retry delay from response headers.
///
/// Understands `retry-after-ms` (milliseconds, sent by OpenAI-style APIs) and
/// the delta-seconds form of `Retry-After`. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(ms) = header_number(headers, "retry-after-ms") {
        return Some(Duration::from_millis(ms));
    }

    header_number(headers, "retry-after").map(Duration::from_secs)
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.ceil() as u64)
}
