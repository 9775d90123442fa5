//! URL list parsing
//!
//! Turns uploaded files or pasted text into a list of URL strings. Entries are
//! not validated here: an invalid entry still gets its own slot in the batch
//! report so the caller can see what was rejected.

use std::path::Path;
use tracing::warn;

/// Supported URL list formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// One URL per line; blank lines and `#` comments are skipped
    Txt,
    /// URL in the first column; a non-URL header row is skipped
    Csv,
    /// Free-form pasted text split on newlines, commas and whitespace
    Paste,
}

impl InputFormat {
    /// Infers the format from a file extension, defaulting to `Txt`
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Self::Csv,
            _ => Self::Txt,
        }
    }
}

/// Parses a URL list in the given format
pub fn parse_url_list(text: &str, format: InputFormat) -> Vec<String> {
    match format {
        InputFormat::Txt => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect(),
        InputFormat::Csv => parse_csv(text),
        InputFormat::Paste => text
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn parse_csv(text: &str) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut urls = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unreadable CSV row {}: {}", index + 1, e);
                continue;
            }
        };

        let first = record.get(0).unwrap_or("");
        if first.is_empty() {
            continue;
        }

        // Header row, e.g. "url,description"
        if index == 0 && !first.contains("://") {
            continue;
        }

        urls.push(first.to_string());
    }

    urls
}
