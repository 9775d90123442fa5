//! Admission control for per-URL pipelines

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Smallest accepted concurrency bound
pub const MIN_CONCURRENT: usize = 1;

/// Largest accepted concurrency bound
pub const MAX_CONCURRENT: usize = 10;

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Counting admission gate bounding how many pipelines run at once
///
/// A pipeline holds its [`AdmissionSlot`] from before its first fetch until
/// its result is produced, including while it sleeps between retries.
/// Cloning shares the gate.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    counters: Arc<Counters>,
}

impl ConcurrencyLimiter {
    /// Creates a limiter; `max_concurrent` is clamped to 1..=10
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = Self::clamp(max_concurrent);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Clamps a requested bound into the supported range
    pub fn clamp(requested: usize) -> usize {
        requested.clamp(MIN_CONCURRENT, MAX_CONCURRENT)
    }

    /// Waits for a free slot
    ///
    /// Returns `None` only if the gate has been closed.
    pub async fn acquire(&self) -> Option<AdmissionSlot> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;

        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);

        Some(AdmissionSlot {
            counters: Arc::clone(&self.counters),
            _permit: permit,
        })
    }

    /// Refuses all future admissions; waiters get `None`
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Pipelines currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest `in_flight` value ever observed
    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

/// Permission for one pipeline to run; released on drop
#[derive(Debug)]
pub struct AdmissionSlot {
    counters: Arc<Counters>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        // counter goes down before the permit is returned
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
