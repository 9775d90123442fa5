//! Per-URL pipeline: validate, fetch, truncate, analyze
//!
//! Each external call runs under the retry policy, races the batch
//! cancellation token, and is shielded against panics so that nothing a
//! collaborator does can take sibling pipelines down with it.

use crate::analyze::{AnalysisFailure, AnalysisInput, AnalysisOptions, SemanticAnalyzer};
use crate::fetch::{ContentFetcher, FetchFailure};
use crate::report::{Stage, UrlFailure, UrlOutcome, UrlResult};
use crate::retry::{FailureKind, RetryDecision, RetryPolicy};
use crate::url::validate_url;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Failure of a single external call, before the retry decision
#[derive(Debug)]
struct CallFailure {
    kind: FailureKind,
    message: String,
    retry_after: Option<Duration>,
}

impl From<FetchFailure> for CallFailure {
    fn from(f: FetchFailure) -> Self {
        Self {
            kind: f.kind,
            message: f.message,
            retry_after: f.retry_after,
        }
    }
}

impl From<AnalysisFailure> for CallFailure {
    fn from(f: AnalysisFailure) -> Self {
        Self {
            kind: f.kind,
            message: f.message,
            retry_after: f.retry_after,
        }
    }
}

/// Stage a pipeline is currently in, readable from other tasks
#[derive(Debug)]
pub(crate) struct StageCell(AtomicU8);

impl StageCell {
    pub(crate) fn new(stage: Stage) -> Self {
        Self(AtomicU8::new(encode_stage(stage)))
    }

    pub(crate) fn set(&self, stage: Stage) {
        self.0.store(encode_stage(stage), Ordering::Release);
    }

    pub(crate) fn get(&self) -> Stage {
        match self.0.load(Ordering::Acquire) {
            0 => Stage::Validation,
            1 => Stage::Admission,
            2 => Stage::Fetch,
            _ => Stage::Analysis,
        }
    }
}

fn encode_stage(stage: Stage) -> u8 {
    match stage {
        Stage::Validation => 0,
        Stage::Admission => 1,
        Stage::Fetch => 2,
        Stage::Analysis => 3,
    }
}

/// Runs one URL through fetch and analysis
pub struct UrlPipeline {
    fetcher: Arc<dyn ContentFetcher>,
    analyzer: Arc<dyn SemanticAnalyzer>,
    policy: RetryPolicy,
    max_content_length: usize,
}

impl UrlPipeline {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        analyzer: Arc<dyn SemanticAnalyzer>,
        policy: RetryPolicy,
        max_content_length: usize,
    ) -> Self {
        Self {
            fetcher,
            analyzer,
            policy,
            max_content_length: max_content_length.max(1),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Produces the terminal result for `url`
    ///
    /// Never fails: every problem, including cancellation through `cancel`,
    /// ends up in the returned [`UrlResult`].
    pub async fn run(
        &self,
        url: &str,
        options: &AnalysisOptions,
        cancel: &CancellationToken,
    ) -> UrlResult {
        let started = Instant::now();
        match validate_url(url) {
            Ok(parsed) => {
                let stage = StageCell::new(Stage::Fetch);
                self.run_validated(url, &parsed, options, cancel, &stage)
                    .await
            }
            Err(e) => reject_invalid(url, &e.to_string(), started.elapsed()),
        }
    }

    /// Runs the fetch and analysis stages for an already validated URL
    pub(crate) async fn run_validated(
        &self,
        url: &str,
        parsed: &Url,
        options: &AnalysisOptions,
        cancel: &CancellationToken,
        stage: &StageCell,
    ) -> UrlResult {
        let started = Instant::now();
        let mut fetch_attempts = 0;
        let mut analyze_attempts = 0;

        stage.set(Stage::Fetch);
        let fetcher = &*self.fetcher;
        let fetched = self
            .with_retry(Stage::Fetch, url, cancel, &mut fetch_attempts, move || {
                fetcher.fetch(parsed)
            })
            .await;

        let outcome = match fetched {
            Err(failure) => UrlOutcome::Error { error: failure },
            Ok(content) => {
                stage.set(Stage::Analysis);
                let (text, truncated) = truncate_chars(&content.raw_text, self.max_content_length);
                if truncated {
                    debug!(
                        url = url,
                        "Content truncated to {} characters for analysis",
                        self.max_content_length
                    );
                }

                let input = AnalysisInput {
                    url: parsed,
                    text,
                    title: content.title.as_deref(),
                    language: content.language.as_deref(),
                    metadata: &content.metadata,
                    truncated,
                };
                let input = &input;
                let analyzer = &*self.analyzer;
                let analyzed = self
                    .with_retry(Stage::Analysis, url, cancel, &mut analyze_attempts, move || {
                        analyzer.analyze(input, options)
                    })
                    .await;

                match analyzed {
                    Ok(mut result) => {
                        result.processing_time = started.elapsed();
                        UrlOutcome::Success { result }
                    }
                    Err(failure) => UrlOutcome::Error { error: failure },
                }
            }
        };

        let result = UrlResult::new(
            url,
            outcome,
            started.elapsed(),
            fetch_attempts,
            analyze_attempts,
        );
        log_outcome(&result);
        result
    }

    /// Calls `call` until it succeeds, the policy gives up, or `cancel` fires
    ///
    /// `attempts` is incremented before every call.
    async fn with_retry<T, E, F, Fut>(
        &self,
        stage: Stage,
        url: &str,
        cancel: &CancellationToken,
        attempts: &mut u32,
        mut call: F,
    ) -> Result<T, UrlFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<CallFailure>,
    {
        loop {
            if cancel.is_cancelled() {
                return Err(deadline_failure(stage));
            }

            *attempts += 1;
            let attempt = *attempts;
            debug!(url = url, stage = %stage, attempt, "Starting attempt");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(deadline_failure(stage)),
                outcome = AssertUnwindSafe(call()).catch_unwind() => outcome,
            };

            let failure: CallFailure = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e.into(),
                Err(panic) => CallFailure {
                    kind: FailureKind::Transient,
                    message: format!("{} panicked: {}", stage, panic_message(panic.as_ref())),
                    retry_after: None,
                },
            };

            match self.policy.decide(attempt, failure.kind, failure.retry_after) {
                RetryDecision::GiveUp => {
                    return Err(UrlFailure::new(stage, failure.kind, failure.message));
                }
                RetryDecision::Retry(delay) => {
                    warn!(
                        url = url,
                        stage = %stage,
                        attempt,
                        kind = %failure.kind,
                        "{}; retrying in {:?}",
                        failure.message,
                        delay
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(deadline_failure(stage)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

pub(crate) fn reject_invalid(url: &str, reason: &str, elapsed: Duration) -> UrlResult {
    let result = UrlResult::rejected(
        url,
        UrlFailure::new(Stage::Validation, FailureKind::InvalidInput, reason),
        elapsed,
    );
    log_outcome(&result);
    result
}

pub(crate) fn deadline_failure(stage: Stage) -> UrlFailure {
    UrlFailure::new(
        stage,
        FailureKind::Timeout,
        format!("batch deadline expired during {}", stage),
    )
}

fn log_outcome(result: &UrlResult) {
    match result.error() {
        None => info!(
            url = %result.url,
            attempts = result.attempts,
            "Analyzed in {:.2}s",
            result.duration.as_secs_f64()
        ),
        Some(failure) => error!(
            url = %result.url,
            attempts = result.attempts,
            stage = %failure.stage,
            kind = %failure.kind,
            "{}",
            failure.message
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Cuts `text` to at most `max_chars` characters
///
/// Returns the kept prefix and whether anything was removed. Never splits a
/// multi-byte character.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
