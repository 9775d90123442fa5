//! Storage traits and error types

use crate::report::{BatchReport, UrlResult};
use crate::storage::BatchRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Batch not found: {0}")]
    BatchNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid timestamp in archive: {0}")]
    Timestamp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only archive of finished batch reports
///
/// Nothing in the pipeline reads from the archive; it exists so past
/// batches can be listed and inspected later.
pub trait ReportStore {
    /// Stores a finished report and returns its batch ID
    ///
    /// `config_hash` identifies the configuration the batch ran with.
    fn record_batch(&mut self, report: &BatchReport, config_hash: &str) -> StorageResult<i64>;

    /// Gets a batch by ID
    fn get_batch(&self, batch_id: i64) -> StorageResult<BatchRecord>;

    /// Gets the most recently recorded batch, if any
    fn latest_batch(&self) -> StorageResult<Option<BatchRecord>>;

    /// Lists up to `limit` batches, newest first
    fn list_batches(&self, limit: usize) -> StorageResult<Vec<BatchRecord>>;

    /// Loads a batch's per-URL results in submission order
    fn load_url_results(&self, batch_id: i64) -> StorageResult<Vec<UrlResult>>;

    /// Rebuilds the full report of a batch
    fn load_report(&self, batch_id: i64) -> StorageResult<BatchReport>;
}
