//! Analysis request options and result types

use crate::report::millis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How thorough the analysis should be
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    Basic,
    Detailed,
    #[default]
    Comprehensive,
}

impl AnalysisDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Detailed => "detailed",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl fmt::Display for AnalysisDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "detailed" | "standard" => Ok(Self::Detailed),
            "comprehensive" => Ok(Self::Comprehensive),
            other => Err(format!(
                "unknown analysis depth '{}' (expected basic, detailed or comprehensive)",
                other
            )),
        }
    }
}

/// Feature flags passed through to the analyzer
///
/// The orchestrator never looks at these; they only shape the analysis
/// request (and therefore its cost and latency).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub include_sentiment: bool,
    pub include_entities: bool,
    pub include_summary: bool,
    pub include_category: bool,
    pub include_keywords: bool,
    pub depth: AnalysisDepth,
    /// Categories the analysis should focus on, if any
    pub custom_categories: Vec<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_sentiment: true,
            include_entities: true,
            include_summary: true,
            include_category: true,
            include_keywords: true,
            depth: AnalysisDepth::default(),
            custom_categories: Vec::new(),
        }
    }
}

/// Overall sentiment label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Mixed,
    #[default]
    #[serde(other)]
    Neutral,
}

/// Sentiment of a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sentiment {
    pub overall: SentimentLabel,
    pub confidence: f64,
    /// Emotion name to intensity (0.0 - 1.0)
    pub emotions: BTreeMap<String, f64>,
}

/// A named entity mentioned on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    /// PERSON, ORG, LOCATION, ...
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub relevance: Option<f64>,
}

/// Structured semantic analysis of one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub category: String,
    pub secondary_categories: Vec<String>,
    pub category_confidence: f64,
    pub sentiment: Sentiment,
    pub entities: Vec<Entity>,
    pub summary: String,
    pub key_insights: Vec<String>,
    pub keywords: Vec<String>,
    pub topics: Vec<String>,
    /// Content quality, 0.0 - 1.0
    pub quality_score: f64,
    pub readability_score: Option<f64>,
    /// Wall-clock time from fetch start to analysis end
    #[serde(rename = "processing_time_ms", with = "millis")]
    pub processing_time: Duration,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            category: "other".to_string(),
            secondary_categories: Vec::new(),
            category_confidence: 0.0,
            sentiment: Sentiment::default(),
            entities: Vec::new(),
            summary: String::new(),
            key_insights: Vec::new(),
            keywords: Vec::new(),
            topics: Vec::new(),
            quality_score: 0.0,
            readability_score: None,
            processing_time: Duration::ZERO,
        }
    }
}
