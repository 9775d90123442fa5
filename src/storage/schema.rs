//! Database schema for the report archive

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per finished batch
CREATE TABLE IF NOT EXISTS batches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    total INTEGER NOT NULL,
    succeeded INTEGER NOT NULL,
    failed INTEGER NOT NULL,
    average_quality REAL,
    config_hash TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

-- One row per submitted URL, in submission order
CREATE TABLE IF NOT EXISTS url_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id INTEGER NOT NULL REFERENCES batches(id),
    position INTEGER NOT NULL,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    category TEXT,
    error_stage TEXT,
    error_kind TEXT,
    error_message TEXT,
    attempts INTEGER NOT NULL,
    duration_ms INTEGER NOT NULL,
    result_json TEXT NOT NULL,
    UNIQUE(batch_id, position)
);

CREATE INDEX IF NOT EXISTS idx_url_results_batch ON url_results(batch_id);
CREATE INDEX IF NOT EXISTS idx_url_results_url ON url_results(url);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
