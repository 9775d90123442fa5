//! Report archive
//!
//! Finished batch reports can be recorded in a SQLite database so past
//! batches can be listed and inspected later (`--history`). The archive is
//! write-only from the pipeline's point of view.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteReportStore;
pub use traits::{ReportStore, StorageError, StorageResult};

use crate::LensError;
use std::path::Path;

/// Opens or creates the report archive at `path`
pub fn open_store(path: &Path) -> Result<SqliteReportStore, LensError> {
    SqliteReportStore::new(path)
}

/// Summary row of an archived batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    pub id: i64,
    pub started_at: String,
    pub completed_at: String,
    pub duration_ms: u64,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub average_quality_score: Option<f64>,
    pub config_hash: String,
}

impl BatchRecord {
    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / self.total as f64) * 100.0
    }
}
