//! Chat-completions analyzer
//!
//! Talks to an OpenAI-compatible API. When an Azure API version is
//! configured, requests use deployment routing and the `api-key` header
//! instead of a bearer token.

use crate::analyze::{
    build_user_prompt, system_prompt, AnalysisFailure, AnalysisInput, AnalysisOptions,
    AnalysisResult, Entity, SemanticAnalyzer, Sentiment,
};
use crate::config::AnalyzerConfig;
use crate::retry::{classify_http_status, parse_retry_after, FailureKind};
use crate::{ConfigError, LensError};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Longest error-body excerpt carried into failure messages
const ERROR_BODY_EXCERPT: usize = 200;

#[derive(Debug, Clone)]
enum ApiAuth {
    Bearer(String),
    AzureKey(String),
}

/// Semantic analyzer backed by a chat-completions endpoint
#[derive(Debug, Clone)]
pub struct LlmAnalyzer {
    client: Client,
    endpoint: String,
    auth: ApiAuth,
    /// Sent in the body for OpenAI; Azure takes the deployment from the path
    model: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmAnalyzer {
    /// Creates an analyzer, reading the API key from `config.api_key_env`
    pub fn new(config: &AnalyzerConfig) -> crate::Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ConfigError::Validation(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        Self::with_api_key(config, api_key)
    }

    /// Creates an analyzer with an explicit API key
    pub fn with_api_key(config: &AnalyzerConfig, api_key: impl Into<String>) -> crate::Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LensError::Config(ConfigError::Validation(
                "analyzer API key is empty".to_string(),
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base = config.base_url.trim_end_matches('/');
        let (endpoint, auth, model) = match &config.azure_api_version {
            Some(version) => (
                format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    base, config.model, version
                ),
                ApiAuth::AzureKey(api_key),
                None,
            ),
            None => (
                format!("{}/chat/completions", base),
                ApiAuth::Bearer(api_key),
                Some(config.model.clone()),
            ),
        };

        Ok(Self {
            client,
            endpoint,
            auth,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Full URL requests are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SemanticAnalyzer for LlmAnalyzer {
    async fn analyze(
        &self,
        input: &AnalysisInput<'_>,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult, AnalysisFailure> {
        let started = Instant::now();
        let user_prompt = build_user_prompt(input, options);

        let request = ChatRequest {
            model: self.model.as_deref(),
            messages: [
                Message {
                    role: "system",
                    content: system_prompt(),
                },
                Message {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let builder = self.client.post(&self.endpoint).json(&request);
        let builder = match &self.auth {
            ApiAuth::Bearer(key) => builder.header(header::AUTHORIZATION, format!("Bearer {}", key)),
            ApiAuth::AzureKey(key) => builder.header("api-key", key),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AnalysisFailure::transient("analysis request timed out")
            } else {
                AnalysisFailure::transient(format!("analysis request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, url = %input.url, "Analysis service returned an error");
            return Err(status_failure(status, &body, retry_after));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisFailure::transient(format!("malformed analysis response: {}", e)))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AnalysisFailure::transient("analysis response was empty"))?;

        let mut result = parse_analysis(&content, options)?;
        result.processing_time = started.elapsed();

        debug!(url = %input.url, category = %result.category, "Analysis complete");
        Ok(result)
    }
}

fn status_failure(status: StatusCode, body: &str, retry_after: Option<Duration>) -> AnalysisFailure {
    let excerpt: String = body.trim().chars().take(ERROR_BODY_EXCERPT).collect();
    let message = if excerpt.is_empty() {
        format!("analysis service returned HTTP {}", status.as_u16())
    } else {
        format!("analysis service returned HTTP {}: {}", status.as_u16(), excerpt)
    };

    match status.as_u16() {
        429 => AnalysisFailure::rate_limited(message, retry_after),
        401 | 403 => AnalysisFailure::permanent(message),
        code => AnalysisFailure::new(classify_http_status(code), message),
    }
}

/// Parses the model's JSON answer into an [`AnalysisResult`]
///
/// Missing fields fall back to empty values, scores are clamped to
/// 0.0 - 1.0, and sections switched off in `options` are cleared.
pub(crate) fn parse_analysis(
    content: &str,
    options: &AnalysisOptions,
) -> Result<AnalysisResult, AnalysisFailure> {
    let raw: RawAnalysis = serde_json::from_str(content).map_err(|e| {
        AnalysisFailure::new(
            FailureKind::Transient,
            format!("analysis response was not valid JSON: {}", e),
        )
    })?;

    let semantic = raw.semantic_analysis;
    let mut result = AnalysisResult {
        category: raw
            .primary_category
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "other".to_string()),
        secondary_categories: raw.secondary_categories,
        category_confidence: clamp_score(raw.category_confidence),
        sentiment: Sentiment {
            confidence: clamp_score(raw.sentiment.confidence),
            ..raw.sentiment
        },
        entities: semantic.entities.into_iter().map(RawEntity::into_entity).collect(),
        summary: raw.content_summary,
        key_insights: raw.key_insights,
        keywords: semantic.semantic_keywords,
        topics: if semantic.main_topics.is_empty() {
            semantic.themes
        } else {
            semantic.main_topics
        },
        quality_score: clamp_score(raw.content_quality_score),
        readability_score: raw.readability_score.map(clamp_score),
        processing_time: Duration::ZERO,
    };

    if !options.include_category {
        result.category = "other".to_string();
        result.secondary_categories.clear();
        result.category_confidence = 0.0;
    }
    if !options.include_sentiment {
        result.sentiment = Sentiment::default();
    }
    if !options.include_entities {
        result.entities.clear();
    }
    if !options.include_summary {
        result.summary.clear();
        result.key_insights.clear();
    }
    if !options.include_keywords {
        result.keywords.clear();
        result.topics.clear();
    }

    Ok(result)
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawAnalysis {
    primary_category: Option<String>,
    secondary_categories: Vec<String>,
    category_confidence: f64,
    content_summary: String,
    key_insights: Vec<String>,
    semantic_analysis: RawSemantic,
    sentiment: Sentiment,
    content_quality_score: f64,
    readability_score: Option<f64>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawSemantic {
    main_topics: Vec<String>,
    entities: Vec<RawEntity>,
    themes: Vec<String>,
    semantic_keywords: Vec<String>,
}

/// Models sometimes list entities as bare names
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntity {
    Full {
        name: String,
        #[serde(rename = "type", default)]
        kind: Option<String>,
        #[serde(default)]
        relevance: Option<f64>,
    },
    Name(String),
}

impl RawEntity {
    fn into_entity(self) -> Entity {
        match self {
            Self::Full {
                name,
                kind,
                relevance,
            } => Entity {
                name,
                kind,
                relevance: relevance.map(clamp_score),
            },
            Self::Name(name) => Entity {
                name,
                kind: None,
                relevance: None,
            },
        }
    }
}
