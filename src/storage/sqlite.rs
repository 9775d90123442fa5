//! SQLite implementation of the report archive

use crate::report::{aggregate, BatchReport, UrlResult};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ReportStore, StorageError, StorageResult};
use crate::storage::BatchRecord;
use crate::LensError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const BATCH_COLUMNS: &str = "id, started_at, completed_at, duration_ms, total, succeeded, failed, average_quality, config_hash";

/// SQLite report archive
pub struct SqliteReportStore {
    conn: Connection,
}

impl SqliteReportStore {
    /// Opens (or creates) the archive at `path`
    pub fn new(path: &Path) -> Result<Self, LensError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, LensError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self { conn })
    }
}

fn batch_from_row(row: &Row<'_>) -> rusqlite::Result<BatchRecord> {
    Ok(BatchRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        completed_at: row.get(2)?,
        duration_ms: row.get::<_, i64>(3)?.max(0) as u64,
        total: row.get::<_, i64>(4)?.max(0) as usize,
        succeeded: row.get::<_, i64>(5)?.max(0) as usize,
        failed: row.get::<_, i64>(6)?.max(0) as usize,
        average_quality_score: row.get(7)?,
        config_hash: row.get(8)?,
    })
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Timestamp(format!("{}: {}", value, e)))
}

fn millis(duration: std::time::Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl ReportStore for SqliteReportStore {
    fn record_batch(&mut self, report: &BatchReport, config_hash: &str) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO batches (started_at, completed_at, duration_ms, total, succeeded, failed, average_quality, config_hash, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                report.started_at.to_rfc3339(),
                report.completed_at.to_rfc3339(),
                millis(report.duration),
                report.total as i64,
                report.succeeded as i64,
                report.failed as i64,
                report.average_quality_score,
                config_hash,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let batch_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO url_results (batch_id, position, url, status, category, error_stage, error_kind, error_message, attempts, duration_ms, result_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            for (position, result) in report.results.iter().enumerate() {
                let json = serde_json::to_string(result)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                let error = result.error();

                stmt.execute(params![
                    batch_id,
                    position as i64,
                    result.url,
                    result.status().as_str(),
                    result.result().map(|r| r.category.as_str()),
                    error.map(|e| e.stage.as_str()),
                    error.map(|e| e.kind.as_str()),
                    error.map(|e| e.message.as_str()),
                    result.attempts,
                    millis(result.duration),
                    json,
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!("Archived batch {} ({} URLs)", batch_id, report.total);
        Ok(batch_id)
    }

    fn get_batch(&self, batch_id: i64) -> StorageResult<BatchRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM batches WHERE id = ?1", BATCH_COLUMNS),
                params![batch_id],
                batch_from_row,
            )
            .optional()?
            .ok_or(StorageError::BatchNotFound(batch_id))
    }

    fn latest_batch(&self) -> StorageResult<Option<BatchRecord>> {
        let batch = self
            .conn
            .query_row(
                &format!("SELECT {} FROM batches ORDER BY id DESC LIMIT 1", BATCH_COLUMNS),
                [],
                batch_from_row,
            )
            .optional()?;
        Ok(batch)
    }

    fn list_batches(&self, limit: usize) -> StorageResult<Vec<BatchRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM batches ORDER BY id DESC LIMIT ?1",
            BATCH_COLUMNS
        ))?;

        let batches = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], batch_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(batches)
    }

    fn load_url_results(&self, batch_id: i64) -> StorageResult<Vec<UrlResult>> {
        let mut stmt = self
            .conn
            .prepare("SELECT result_json FROM url_results WHERE batch_id = ?1 ORDER BY position")?;

        let rows = stmt
            .query_map(params![batch_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|json| {
                serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .collect()
    }

    fn load_report(&self, batch_id: i64) -> StorageResult<BatchReport> {
        let batch = self.get_batch(batch_id)?;
        let results = self.load_url_results(batch_id)?;

        Ok(aggregate(
            results,
            parse_timestamp(&batch.started_at)?,
            parse_timestamp(&batch.completed_at)?,
        ))
    }
}
