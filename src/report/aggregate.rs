use crate::report::{BatchReport, ErrorEntry, UrlOutcome, UrlResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Builds the batch report from per-URL results
///
/// Pure and deterministic: `results` keep their order, and every derived
/// figure is computed from them alone.
pub fn aggregate(
    results: Vec<UrlResult>,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
) -> BatchReport {
    let mut category_distribution = BTreeMap::new();
    let mut errors = Vec::new();
    let mut quality_sum = 0.0;
    let mut quality_count = 0usize;

    for url_result in &results {
        match &url_result.outcome {
            UrlOutcome::Success { result } => {
                *category_distribution
                    .entry(result.category.clone())
                    .or_insert(0) += 1;
                if result.quality_score > 0.0 {
                    quality_sum += result.quality_score;
                    quality_count += 1;
                }
            }
            UrlOutcome::Error { error } => errors.push(ErrorEntry {
                url: url_result.url.clone(),
                stage: error.stage,
                kind: error.kind,
                message: error.message.clone(),
            }),
        }
    }

    let total = results.len();
    let failed = errors.len();

    BatchReport {
        total,
        succeeded: total - failed,
        failed,
        duration: (completed_at - started_at).to_std().unwrap_or_default(),
        results,
        started_at,
        completed_at,
        category_distribution,
        average_quality_score: (quality_count > 0).then(|| quality_sum / quality_count as f64),
        errors,
    }
}
