//! Sumi-Lens main entry point
//!
//! This is the command-line interface for the Sumi-Lens bulk URL analyzer.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sumi_lens::analyze::{AnalysisDepth, AnalysisOptions, LlmAnalyzer};
use sumi_lens::config::{load_config_with_hash, Config};
use sumi_lens::fetch::HttpFetcher;
use sumi_lens::pipeline::{BatchOrchestrator, ConcurrencyLimiter};
use sumi_lens::report::{generate_markdown_summary, BatchReport, UrlOutcome};
use sumi_lens::storage::{open_store, ReportStore};
use sumi_lens::url::{parse_url_list, validate_url, InputFormat};
use tracing_subscriber::EnvFilter;

/// How often progress is logged while a batch runs
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Batches listed by --history
const HISTORY_LIMIT: usize = 20;

/// Sumi-Lens: bulk semantic analysis of web pages
///
/// Fetches every URL, sends its text to a language-model analysis service
/// and prints a report with category, sentiment, entities, summary and
/// quality score per page.
#[derive(Parser, Debug)]
#[command(name = "sumi-lens")]
#[command(version)]
#[command(about = "Bulk semantic analysis of web pages", long_about = None)]
struct Cli {
    /// URLs to analyze
    #[arg(value_name = "URLS")]
    urls: Vec<String>,

    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Read URLs from a .txt (one per line) or .csv (first column) file
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Maximum URLs analyzed at once (clamped to 1..=10)
    #[arg(long, value_name = "N")]
    max_concurrent: Option<usize>,

    /// Overall batch deadline in seconds
    #[arg(long, value_name = "SECS")]
    deadline: Option<u64>,

    /// Analysis depth: basic, detailed or comprehensive
    #[arg(long, value_name = "DEPTH")]
    depth: Option<AnalysisDepth>,

    /// Custom category to focus on (repeatable)
    #[arg(long = "category", value_name = "NAME")]
    categories: Vec<String>,

    /// Skip sentiment analysis
    #[arg(long)]
    no_sentiment: bool,

    /// Skip entity extraction
    #[arg(long)]
    no_entities: bool,

    /// Skip summary and key insights
    #[arg(long)]
    no_summary: bool,

    /// Skip categorization
    #[arg(long)]
    no_category: bool,

    /// Skip keywords and topics
    #[arg(long)]
    no_keywords: bool,

    /// Print the full report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Write a markdown summary to this file
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Validate configuration and URLs without touching the network
    #[arg(long, conflicts_with = "history")]
    dry_run: bool,

    /// List archived batches and exit
    #[arg(long, conflicts_with = "dry_run")]
    history: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            include_sentiment: !self.no_sentiment,
            include_entities: !self.no_entities,
            include_summary: !self.no_summary,
            include_category: !self.no_category,
            include_keywords: !self.no_keywords,
            depth: self.depth.unwrap_or_default(),
            custom_categories: self.categories.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            (Config::default(), "default".to_string())
        }
    };

    if cli.history {
        return handle_history(&config);
    }

    let urls = collect_urls(&cli)?;

    if cli.dry_run {
        handle_dry_run(&cli, &config, &urls);
        return Ok(());
    }

    handle_analyze(&cli, &config, &config_hash, urls).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_lens=info,warn"),
            1 => EnvFilter::new("sumi_lens=debug,info"),
            2 => EnvFilter::new("sumi_lens=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Gathers URLs from the command line and the input file, in that order
fn collect_urls(cli: &Cli) -> anyhow::Result<Vec<String>> {
    let mut urls: Vec<String> = cli
        .urls
        .iter()
        .flat_map(|arg| parse_url_list(arg, InputFormat::Paste))
        .collect();

    if let Some(path) = &cli.input {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let from_file = parse_url_list(&text, InputFormat::from_path(path));
        tracing::info!("Read {} URLs from {}", from_file.len(), path.display());
        urls.extend(from_file);
    }

    if urls.is_empty() {
        bail!("no URLs given; pass them as arguments or with --input");
    }

    Ok(urls)
}

/// Handles the --dry-run mode: validates config and URLs
fn handle_dry_run(cli: &Cli, config: &Config, urls: &[String]) {
    println!("=== Sumi-Lens Dry Run ===\n");

    let requested = cli.max_concurrent.unwrap_or(config.batch.max_concurrent);
    println!("Batch Configuration:");
    println!(
        "  Max concurrent: {} (requested {})",
        ConcurrencyLimiter::clamp(requested),
        requested
    );
    println!("  Max batch size: {}", config.batch.max_batch_size);
    println!(
        "  Deadline: {}s",
        cli.deadline.unwrap_or(config.batch.deadline_secs)
    );
    println!("  Max content length: {} chars", config.batch.max_content_length);

    println!("\nRetry:");
    println!("  Max attempts per stage: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms base, {}ms cap, jitter {}",
        config.retry.base_delay_millis, config.retry.max_delay_millis, config.retry.jitter
    );

    println!("\nAnalyzer:");
    println!("  Endpoint: {}", config.analyzer.base_url);
    println!("  Model: {}", config.analyzer.model);
    if let Some(version) = &config.analyzer.azure_api_version {
        println!("  Azure API version: {}", version);
    }
    println!(
        "  API key ({}): {}",
        config.analyzer.api_key_env,
        if std::env::var(&config.analyzer.api_key_env).is_ok() {
            "set"
        } else {
            "NOT SET"
        }
    );

    let options = cli.analysis_options();
    println!("\nAnalysis depth: {}", options.depth);

    println!("\nURLs ({}):", urls.len());
    let mut invalid = 0;
    for url in urls {
        match validate_url(url) {
            Ok(_) => println!("  ✓ {}", url),
            Err(e) => {
                invalid += 1;
                println!("  ✗ {} ({})", url, e);
            }
        }
    }

    println!("\n✓ Configuration is valid");
    if urls.len() > config.batch.max_batch_size {
        println!(
            "✗ {} URLs exceed the batch limit of {}",
            urls.len(),
            config.batch.max_batch_size
        );
    } else {
        println!(
            "✓ Would analyze {} URLs ({} would be rejected as invalid)",
            urls.len() - invalid,
            invalid
        );
    }
}

/// Handles the --history mode: lists archived batches
fn handle_history(config: &Config) -> anyhow::Result<()> {
    let Some(database_path) = &config.output.database_path else {
        bail!("no database-path configured in [output]");
    };

    println!("Database: {}\n", database_path);
    let store = open_store(Path::new(database_path))?;
    let batches = store.list_batches(HISTORY_LIMIT)?;

    if batches.is_empty() {
        println!("No batches recorded yet");
        return Ok(());
    }

    println!(
        "{:>5}  {:<25}  {:>6}  {:>6}  {:>6}  {:>8}",
        "ID", "Started", "Total", "OK", "Failed", "Time (s)"
    );
    for batch in batches {
        println!(
            "{:>5}  {:<25}  {:>6}  {:>6}  {:>6}  {:>8.1}",
            batch.id,
            batch.started_at.chars().take(25).collect::<String>(),
            batch.total,
            batch.succeeded,
            batch.failed,
            batch.duration_ms as f64 / 1000.0
        );
    }

    Ok(())
}

/// Handles the main analysis run
async fn handle_analyze(
    cli: &Cli,
    config: &Config,
    config_hash: &str,
    urls: Vec<String>,
) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new(&config.fetcher).context("failed to build HTTP client")?;
    let analyzer = LlmAnalyzer::new(&config.analyzer).context("failed to set up the analyzer")?;
    let orchestrator = BatchOrchestrator::from_config(config, Arc::new(fetcher), Arc::new(analyzer));

    let handle = orchestrator.submit_batch(
        urls,
        cli.analysis_options(),
        cli.max_concurrent,
        cli.deadline.map(Duration::from_secs),
    )?;

    let control = handle.control();
    let interrupt = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling batch");
            interrupt.cancel();
        }
    });

    let wait = handle.wait();
    tokio::pin!(wait);
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    ticker.tick().await;

    let report = loop {
        tokio::select! {
            report = &mut wait => break report?,
            _ = ticker.tick() => {
                let progress = control.progress();
                tracing::info!(
                    "Progress: {}/{} URLs ({:.0}%)",
                    progress.completed,
                    progress.total,
                    progress.fraction() * 100.0
                );
            }
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !cli.quiet {
        print_report(&report);
    }

    let summary_path = cli
        .summary
        .clone()
        .or_else(|| config.output.summary_path.as_ref().map(PathBuf::from));
    if let Some(path) = summary_path {
        generate_markdown_summary(&report, &path)?;
        tracing::info!("Summary written to: {}", path.display());
    }

    if let Some(database_path) = &config.output.database_path {
        let mut store = open_store(Path::new(database_path))?;
        let batch_id = store.record_batch(&report, config_hash)?;
        tracing::info!("Batch archived as #{} in {}", batch_id, database_path);
    }

    Ok(())
}

fn print_report(report: &BatchReport) {
    println!("=== Sumi-Lens Batch Report ===\n");

    for (i, result) in report.results.iter().enumerate() {
        match &result.outcome {
            UrlOutcome::Success { result: analysis } => println!(
                "{:>3}. ✓ {} [{}] quality {:.2}, sentiment {:?} ({} attempts, {:.1}s)",
                i + 1,
                result.url,
                analysis.category,
                analysis.quality_score,
                analysis.sentiment.overall,
                result.attempts,
                result.duration.as_secs_f64()
            ),
            UrlOutcome::Error { error } => println!(
                "{:>3}. ✗ {} [{}] {} ({} attempts)",
                i + 1,
                result.url,
                error.kind,
                error.message,
                result.attempts
            ),
        }
    }

    println!();
    println!(
        "Total: {}, succeeded: {}, failed: {} ({:.1}% success) in {:.1}s",
        report.total,
        report.succeeded,
        report.failed,
        report.success_rate(),
        report.duration.as_secs_f64()
    );
    if let Some(avg) = report.average_quality_score {
        println!("Average quality score: {:.2}", avg);
    }
    if !report.category_distribution.is_empty() {
        let categories: Vec<String> = report
            .category_distribution
            .iter()
            .map(|(category, count)| format!("{} ({})", category, count))
            .collect();
        println!("Categories: {}", categories.join(", "));
    }
}
