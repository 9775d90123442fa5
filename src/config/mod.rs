//! Configuration module for Sumi-Lens
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The loaded [`Config`] is handed to the orchestrator explicitly; nothing in the
//! crate reads configuration from ambient process state.
//!
//! # Example
//!
//! ```no_run
//! use sumi_lens::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sumi-lens.toml")).unwrap();
//! println!("Batches run with up to {} URLs in flight", config.batch.max_concurrent);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{AnalyzerConfig, BatchConfig, Config, FetcherConfig, OutputConfig, RetryConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
