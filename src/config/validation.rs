use crate::config::types::{AnalyzerConfig, BatchConfig, Config, FetcherConfig, RetryConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// `batch.max-concurrent` is deliberately absent here: out-of-range values
/// are clamped when a batch starts.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_batch_config(&config.batch)?;
    validate_retry_config(&config.retry)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_analyzer_config(&config.analyzer)?;
    Ok(())
}

fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    if config.max_batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "max-batch-size must be >= 1, got {}",
            config.max_batch_size
        )));
    }

    if config.deadline_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "deadline-secs must be >= 1, got {}",
            config.deadline_secs
        )));
    }

    if config.max_content_length < 1 {
        return Err(ConfigError::Validation(format!(
            "max-content-length must be >= 1, got {}",
            config.max_content_length
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_millis > config.max_delay_millis {
        return Err(ConfigError::Validation(format!(
            "base-delay-millis ({}) cannot exceed max-delay-millis ({})",
            config.base_delay_millis, config.max_delay_millis
        )));
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "fetcher user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "fetcher timeouts must be >= 1s, got timeout={}s connect={}s",
            config.timeout_secs, config.connect_timeout_secs
        )));
    }

    Ok(())
}

fn validate_analyzer_config(config: &AnalyzerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid analyzer base-url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "analyzer base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "analyzer model cannot be empty".to_string(),
        ));
    }

    if config.api_key_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "analyzer api-key-env cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "analyzer timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(ConfigError::Validation(format!(
            "analyzer temperature must be between 0.0 and 2.0, got {}",
            config.temperature
        )));
    }

    if config.max_tokens < 1 {
        return Err(ConfigError::Validation(
            "analyzer max-tokens must be >= 1".to_string(),
        ));
    }

    Ok(())
}
