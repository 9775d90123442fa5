//! Batch orchestrator
//!
//! Fans a URL list out over the concurrency limiter, collects results into
//! per-index slots, enforces the batch deadline and hands the slots to the
//! aggregator.

use crate::analyze::{AnalysisOptions, SemanticAnalyzer};
use crate::config::{BatchConfig, Config};
use crate::fetch::ContentFetcher;
use crate::pipeline::limiter::ConcurrencyLimiter;
use crate::pipeline::runner::{deadline_failure, reject_invalid, StageCell, UrlPipeline};
use crate::report::{aggregate, BatchReport, Stage, UrlFailure, UrlResult};
use crate::retry::{FailureKind, RetryPolicy};
use crate::url::validate_url;
use crate::{LensError, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Batch-level limits, passed in explicitly rather than read globally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    /// Requested concurrency bound (clamped to 1..=10 when a batch starts)
    pub max_concurrent: usize,
    /// Largest accepted batch
    pub max_batch_size: usize,
    /// Overall batch deadline
    pub deadline: Duration,
    /// How long cancelled pipelines get to report after the deadline
    pub grace: Duration,
}

impl BatchSettings {
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            max_batch_size: config.max_batch_size,
            deadline: config.deadline(),
            grace: config.grace(),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::from_config(&BatchConfig::default())
    }
}

/// Snapshot of a running batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Slots that hold a terminal result
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    /// Fraction of terminal slots, 0.0 - 1.0
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

/// Progress and cancellation access to a running batch
///
/// Cheap to clone; stays usable after the [`BatchHandle`] has been consumed
/// by [`BatchHandle::wait`].
#[derive(Debug, Clone)]
pub struct BatchControl {
    total: usize,
    completed: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl BatchControl {
    pub fn progress(&self) -> BatchProgress {
        BatchProgress {
            completed: self.completed.load(Ordering::SeqCst).min(self.total),
            total: self.total,
        }
    }

    /// Stops the batch as if its deadline had expired
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A submitted batch
///
/// Dropping the handle does not stop the batch; call [`BatchHandle::cancel`]
/// for that.
pub struct BatchHandle {
    control: BatchControl,
    limiter: ConcurrencyLimiter,
    task: JoinHandle<BatchReport>,
}

impl BatchHandle {
    pub fn progress(&self) -> BatchProgress {
        self.control.progress()
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn control(&self) -> BatchControl {
        self.control.clone()
    }

    /// The limiter the batch runs under
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Waits for the final report
    pub async fn wait(self) -> Result<BatchReport> {
        Ok(self.task.await?)
    }
}

/// Runs batches of URLs through [`UrlPipeline`]s
#[derive(Clone)]
pub struct BatchOrchestrator {
    pipeline: Arc<UrlPipeline>,
    settings: BatchSettings,
}

impl BatchOrchestrator {
    pub fn new(pipeline: UrlPipeline, settings: BatchSettings) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            settings,
        }
    }

    /// Builds an orchestrator from a loaded configuration
    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn ContentFetcher>,
        analyzer: Arc<dyn SemanticAnalyzer>,
    ) -> Self {
        let pipeline = UrlPipeline::new(
            fetcher,
            analyzer,
            RetryPolicy::from_config(&config.retry),
            config.batch.max_content_length,
        );
        Self::new(pipeline, BatchSettings::from_config(&config.batch))
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Analyzes `urls` and waits for the report
    ///
    /// `max_concurrent` and `deadline` override the configured settings.
    /// Fails only when the URL list is empty or too long; every per-URL
    /// problem is reported inside the returned [`BatchReport`].
    pub async fn run_batch(
        &self,
        urls: Vec<String>,
        options: AnalysisOptions,
        max_concurrent: Option<usize>,
        deadline: Option<Duration>,
    ) -> Result<BatchReport> {
        self.submit_batch(urls, options, max_concurrent, deadline)?
            .wait()
            .await
    }

    /// Starts a batch in the background and returns a handle to it
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit_batch(
        &self,
        urls: Vec<String>,
        options: AnalysisOptions,
        max_concurrent: Option<usize>,
        deadline: Option<Duration>,
    ) -> Result<BatchHandle> {
        if urls.is_empty() {
            return Err(LensError::InvalidInput("URL list is empty".to_string()));
        }
        if urls.len() > self.settings.max_batch_size {
            return Err(LensError::InvalidInput(format!(
                "batch of {} URLs exceeds the maximum of {}",
                urls.len(),
                self.settings.max_batch_size
            )));
        }

        let requested = max_concurrent.unwrap_or(self.settings.max_concurrent);
        let limiter = ConcurrencyLimiter::new(requested);
        if limiter.max_concurrent() != requested {
            warn!(
                "max_concurrent {} out of range, clamped to {}",
                requested,
                limiter.max_concurrent()
            );
        }

        let run = BatchRun {
            pipeline: Arc::clone(&self.pipeline),
            limiter: limiter.clone(),
            options: Arc::new(options),
            cancel: CancellationToken::new(),
            completed: Arc::new(AtomicUsize::new(0)),
            deadline: deadline.unwrap_or(self.settings.deadline),
            grace: self.settings.grace,
        };

        let handle = BatchHandle {
            control: BatchControl {
                total: urls.len(),
                completed: Arc::clone(&run.completed),
                cancel: run.cancel.clone(),
            },
            limiter,
            task: tokio::spawn(run.drive(urls)),
        };

        Ok(handle)
    }
}

/// State shared by one batch's collector and its pipeline tasks
struct BatchRun {
    pipeline: Arc<UrlPipeline>,
    limiter: ConcurrencyLimiter,
    options: Arc<AnalysisOptions>,
    cancel: CancellationToken,
    completed: Arc<AtomicUsize>,
    deadline: Duration,
    grace: Duration,
}

impl BatchRun {
    async fn drive(self, urls: Vec<String>) -> BatchReport {
        let started_at = Utc::now();
        let started = Instant::now();
        let total = urls.len();
        info!(
            "Starting batch of {} URLs (max concurrent {}, deadline {:?})",
            total,
            self.limiter.max_concurrent(),
            self.deadline
        );

        let mut slots: Vec<Option<UrlResult>> = vec![None; total];
        let stages: Vec<Arc<StageCell>> = (0..total)
            .map(|_| Arc::new(StageCell::new(Stage::Admission)))
            .collect();
        let mut tasks = JoinSet::new();

        for (index, url) in urls.iter().enumerate() {
            match validate_url(url) {
                Ok(parsed) => {
                    tasks.spawn(self.pipeline_task(index, url.clone(), parsed, Arc::clone(&stages[index])));
                }
                Err(e) => {
                    slots[index] = Some(reject_invalid(url, &e.to_string(), Duration::ZERO));
                    self.completed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let deadline = tokio::time::sleep(self.deadline);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(joined) => self.record(&mut slots, joined),
                    None => break,
                },
                _ = &mut deadline, if !self.cancel.is_cancelled() => {
                    warn!("Batch deadline of {:?} expired", self.deadline);
                    self.cancel.cancel();
                }
                _ = self.cancel.cancelled() => {
                    // queued pipelines give up admission at once
                    self.limiter.close();
                    self.drain_within_grace(&mut tasks, &mut slots).await;
                    break;
                }
            }
        }

        // Slots still empty belong to aborted or crashed tasks. Their attempt
        // counts died with the task, so they report 0 attempts.
        let timed_out = self.cancel.is_cancelled();
        let elapsed = started.elapsed();
        let results: Vec<UrlResult> = slots
            .into_iter()
            .zip(urls)
            .zip(stages)
            .map(|((slot, url), stage)| match slot {
                Some(result) => result,
                None if timed_out => UrlResult::rejected(url, deadline_failure(stage.get()), elapsed),
                None => UrlResult::rejected(
                    url,
                    UrlFailure::new(stage.get(), FailureKind::Transient, "pipeline task failed"),
                    elapsed,
                ),
            })
            .collect();
        self.completed.store(total, Ordering::SeqCst);

        let report = aggregate(results, started_at, Utc::now());
        info!(
            "Batch complete: {}/{} succeeded in {:.2}s",
            report.succeeded,
            report.total,
            report.duration.as_secs_f64()
        );
        report
    }

    fn pipeline_task(
        &self,
        index: usize,
        url: String,
        parsed: Url,
        stage: Arc<StageCell>,
    ) -> impl std::future::Future<Output = (usize, UrlResult)> + Send + 'static {
        let pipeline = Arc::clone(&self.pipeline);
        let limiter = self.limiter.clone();
        let options = Arc::clone(&self.options);
        let cancel = self.cancel.clone();

        async move {
            let queued = Instant::now();
            let slot = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                slot = limiter.acquire() => slot,
            };

            let result = match slot {
                Some(_slot) => {
                    debug!(url = %url, "Admitted after {:?}", queued.elapsed());
                    pipeline
                        .run_validated(&url, &parsed, &options, &cancel, &stage)
                        .await
                }
                None => UrlResult::rejected(
                    url.as_str(),
                    deadline_failure(Stage::Admission),
                    queued.elapsed(),
                ),
            };
            (index, result)
        }
    }

    fn record(
        &self,
        slots: &mut [Option<UrlResult>],
        joined: std::result::Result<(usize, UrlResult), tokio::task::JoinError>,
    ) {
        match joined {
            Ok((index, result)) => {
                slots[index] = Some(result);
                self.completed.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => warn!("Pipeline task ended abnormally: {}", e),
        }
    }

    /// Collects pipelines that report within the grace period, aborts the rest
    async fn drain_within_grace(
        &self,
        tasks: &mut JoinSet<(usize, UrlResult)>,
        slots: &mut [Option<UrlResult>],
    ) {
        let drained = tokio::time::timeout(self.grace, async {
            while let Some(joined) = tasks.join_next().await {
                self.record(slots, joined);
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "{} pipelines did not stop within {:?}; aborting",
                tasks.len(),
                self.grace
            );
            tasks.abort_all();
        }
    }
}
