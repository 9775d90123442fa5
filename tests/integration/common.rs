//! Scripted collaborators for batch tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_lens::analyze::{AnalysisFailure, AnalysisInput, AnalysisOptions, AnalysisResult, SemanticAnalyzer};
use sumi_lens::fetch::{ContentFetcher, FetchFailure, FetchedContent};
use sumi_lens::pipeline::{BatchOrchestrator, BatchSettings, UrlPipeline};
use sumi_lens::retry::{FailureKind, RetryPolicy};
use url::Url;

/// What a fake collaborator does on one call
#[derive(Debug, Clone)]
pub enum Step {
    Ok,
    Fail(FailureKind),
    RateLimited(Option<Duration>),
    Panic,
    /// Never completes
    Hang,
    /// Blocks its worker thread, ignoring cancellation, then succeeds
    Block(Duration),
}

/// Per-URL scripts; a URL with no remaining steps succeeds
#[derive(Default)]
struct Script {
    steps: Mutex<HashMap<String, VecDeque<Step>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: AtomicU32,
}

impl Script {
    fn next(&self, url: &Url) -> (Step, Duration) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap()
            .get_mut(url.as_str())
            .and_then(|steps| steps.pop_front())
            .unwrap_or(Step::Ok);
        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(url.as_str())
            .copied()
            .unwrap_or_default();
        (step, delay)
    }

    fn set(&self, url: &str, steps: Vec<Step>) {
        self.steps
            .lock()
            .unwrap()
            .insert(url.to_string(), steps.into());
    }

    fn set_delay(&self, url: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
    }
}

async fn play(step: Step, delay: Duration) -> Result<(), (FailureKind, Option<Duration>)> {
    tokio::time::sleep(delay).await;
    match step {
        Step::Ok => Ok(()),
        Step::Fail(kind) => Err((kind, None)),
        Step::RateLimited(after) => Err((FailureKind::RateLimited, after)),
        Step::Panic => panic!("scripted panic"),
        Step::Hang => {
            futures::future::pending::<()>().await;
            Ok(())
        }
        Step::Block(duration) => {
            std::thread::sleep(duration);
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    script: Script,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, url: &str, steps: Vec<Step>) {
        self.script.set(url, steps);
    }

    pub fn delay(&self, url: &str, delay: Duration) {
        self.script.set_delay(url, delay);
    }

    pub fn calls(&self) -> u32 {
        self.script.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedContent, FetchFailure> {
        let (step, delay) = self.script.next(url);
        match play(step, delay).await {
            Ok(()) => Ok(FetchedContent::from_text(format!("Content of {}", url))),
            Err((kind, retry_after)) => Err(FetchFailure {
                kind,
                message: format!("scripted {} failure", kind),
                retry_after,
            }),
        }
    }
}

#[derive(Default)]
pub struct FakeAnalyzer {
    script: Script,
}

impl FakeAnalyzer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, url: &str, steps: Vec<Step>) {
        self.script.set(url, steps);
    }

    pub fn calls(&self) -> u32 {
        self.script.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SemanticAnalyzer for FakeAnalyzer {
    async fn analyze(
        &self,
        input: &AnalysisInput<'_>,
        _options: &AnalysisOptions,
    ) -> Result<AnalysisResult, AnalysisFailure> {
        let (step, delay) = self.script.next(input.url);
        match play(step, delay).await {
            Ok(()) => Ok(AnalysisResult {
                category: input.url.host_str().unwrap_or("other").to_string(),
                quality_score: 0.5,
                summary: input.text.to_string(),
                ..AnalysisResult::default()
            }),
            Err((kind, retry_after)) => Err(AnalysisFailure {
                kind,
                message: format!("scripted {} failure", kind),
                retry_after,
            }),
        }
    }
}

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        jitter: false,
    }
}

pub fn settings() -> BatchSettings {
    BatchSettings {
        max_concurrent: 5,
        max_batch_size: 50,
        deadline: Duration::from_secs(10),
        grace: Duration::from_millis(200),
    }
}

pub fn orchestrator(
    fetcher: Arc<FakeFetcher>,
    analyzer: Arc<FakeAnalyzer>,
    settings: BatchSettings,
) -> BatchOrchestrator {
    let pipeline = UrlPipeline::new(fetcher, analyzer, fast_policy(), 10_000);
    BatchOrchestrator::new(pipeline, settings)
}

pub fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
