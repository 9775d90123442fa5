//! Bounded-concurrency analysis pipeline
//!
//! This module contains:
//! - [`ConcurrencyLimiter`], the admission gate bounding running pipelines
//! - [`UrlPipeline`], which takes one URL from validation to a terminal result
//! - [`BatchOrchestrator`], which fans a batch out and collects the report

mod limiter;
mod orchestrator;
mod runner;

pub use limiter::{AdmissionSlot, ConcurrencyLimiter, MAX_CONCURRENT, MIN_CONCURRENT};
pub use orchestrator::{BatchControl, BatchHandle, BatchOrchestrator, BatchProgress, BatchSettings};
pub use runner::{truncate_chars, UrlPipeline};
