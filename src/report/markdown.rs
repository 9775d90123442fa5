//! Markdown summary generation
//!
//! Renders a [`BatchReport`] as a human-readable summary: headline numbers,
//! category breakdown, per-URL table and error list.

use crate::report::{BatchReport, OutputResult, UrlOutcome};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Longest summary excerpt shown in the per-URL table
const SUMMARY_EXCERPT: usize = 120;

/// Writes the markdown summary of a report to `output_path`
pub fn generate_markdown_summary(report: &BatchReport, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a batch report as markdown
pub fn format_markdown_summary(report: &BatchReport) -> String {
    let mut md = String::new();

    md.push_str("# Sumi-Lens Batch Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Completed**: {}\n", report.completed_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n\n",
        report.duration.as_secs_f64()
    ));

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Total URLs**: {}\n", report.total));
    md.push_str(&format!("- **Succeeded**: {}\n", report.succeeded));
    md.push_str(&format!("- **Failed**: {}\n", report.failed));
    md.push_str(&format!("- **Success Rate**: {:.2}%\n", report.success_rate()));
    if let Some(avg) = report.average_quality_score {
        md.push_str(&format!("- **Average Quality Score**: {:.2}\n", avg));
    }
    md.push('\n');

    if !report.category_distribution.is_empty() {
        md.push_str("## Categories\n\n");
        md.push_str("| Category | URLs |\n");
        md.push_str("|----------|------|\n");

        let mut categories: Vec<_> = report.category_distribution.iter().collect();
        categories.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (category, count) in categories {
            md.push_str(&format!("| {} | {} |\n", category, count));
        }
        md.push('\n');
    }

    md.push_str("## Results\n\n");
    md.push_str("| # | URL | Status | Category | Quality | Attempts | Time (s) |\n");
    md.push_str("|---|-----|--------|----------|---------|----------|----------|\n");
    for (i, result) in report.results.iter().enumerate() {
        let (category, quality) = match &result.outcome {
            UrlOutcome::Success { result } => {
                (result.category.clone(), format!("{:.2}", result.quality_score))
            }
            UrlOutcome::Error { error } => (format!("({})", error.kind), "-".to_string()),
        };
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {:.2} |\n",
            i + 1,
            escape_cell(&result.url),
            result.status(),
            category,
            quality,
            result.attempts,
            result.duration.as_secs_f64()
        ));
    }
    md.push('\n');

    let summaries: Vec<_> = report
        .results
        .iter()
        .filter_map(|r| r.result().map(|a| (&r.url, a)))
        .filter(|(_, a)| !a.summary.is_empty())
        .collect();
    if !summaries.is_empty() {
        md.push_str("## Summaries\n\n");
        for (url, analysis) in summaries {
            md.push_str(&format!("- **{}**: {}\n", url, excerpt(&analysis.summary)));
        }
        md.push('\n');
    }

    if !report.errors.is_empty() {
        md.push_str("## Errors\n\n");
        md.push_str("| URL | Stage | Kind | Message |\n");
        md.push_str("|-----|-------|------|---------|\n");
        for error in &report.errors {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                escape_cell(&error.url),
                error.stage,
                error.kind,
                escape_cell(&error.message)
            ));
        }
        md.push('\n');
    }

    md.push_str("---\n\n");
    md.push_str(&format!(
        "*Generated by Sumi-Lens v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= SUMMARY_EXCERPT {
        return text.to_string();
    }
    let cut: String = text.chars().take(SUMMARY_EXCERPT).collect();
    format!("{}...", cut.trim_end())
}
