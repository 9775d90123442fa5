use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Sumi-Lens
///
/// Every section is optional; an empty file yields the documented defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub batch: BatchConfig,
    pub retry: RetryConfig,
    pub fetcher: FetcherConfig,
    pub analyzer: AnalyzerConfig,
    pub output: OutputConfig,
}

/// Batch orchestration configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of URLs analyzed simultaneously (clamped to 1..=10)
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: usize,

    /// Upper bound on the number of URLs accepted in one batch
    #[serde(rename = "max-batch-size")]
    pub max_batch_size: usize,

    /// Overall batch deadline (seconds)
    #[serde(rename = "deadline-secs")]
    pub deadline_secs: u64,

    /// How long cancelled pipelines get to report after the deadline (milliseconds)
    #[serde(rename = "grace-millis")]
    pub grace_millis: u64,

    /// Maximum number of characters of page text sent to the analyzer
    #[serde(rename = "max-content-length")]
    pub max_content_length: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            max_batch_size: 100,
            deadline_secs: 300,
            grace_millis: 2000,
            max_content_length: 50_000,
        }
    }
}

impl BatchConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_millis)
    }
}

/// Retry behaviour for the fetch and analysis stages
///
/// Each stage gets its own budget of `max_attempts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per stage, including the first one
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(rename = "base-delay-millis")]
    pub base_delay_millis: u64,

    /// Upper bound on computed backoff delays (milliseconds)
    #[serde(rename = "max-delay-millis")]
    pub max_delay_millis: u64,

    /// Randomize computed delays within [delay/2, delay]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_millis: 1000,
            max_delay_millis: 30_000,
            jitter: true,
        }
    }
}

/// HTTP fetcher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// User-Agent header sent with every page request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Total request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("sumi-lens/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Language-model analysis service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Base URL of the chat-completions API
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Model name, or deployment name when `azure_api_version` is set
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Azure OpenAI API version; switches to deployment-style routing
    #[serde(rename = "azure-api-version")]
    pub azure_api_version: Option<String>,

    /// Request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum completion tokens
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            azure_api_version: None,
            timeout_secs: 60,
            temperature: 0.3,
            max_tokens: 4000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite report archive (archiving disabled when unset)
    #[serde(rename = "database-path")]
    pub database_path: Option<String>,

    /// Path to the markdown summary file (not written when unset)
    #[serde(rename = "summary-path")]
    pub summary_path: Option<String>,
}
