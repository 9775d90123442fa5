//! Retry and backoff policy.
//!
//! This module encapsulates failure classification (rate limiting, transient
//! network trouble, permanent rejection) and exponential backoff decisions so
//! the fetch and analysis stages share one consistent policy.

mod classify;
mod policy;

pub use classify::{classify_http_status, parse_retry_after, FailureKind};
pub use policy::{RetryDecision, RetryPolicy};
