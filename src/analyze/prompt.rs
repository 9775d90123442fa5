//! Prompt construction for the language-model analyzer

use crate::analyze::{AnalysisInput, AnalysisOptions};

/// Appended to page text that was shortened before analysis
pub const TRUNCATION_MARKER: &str = "... [content truncated]";

const RULE: &str = "==================================================";

const SYSTEM_PROMPT: &str = r#"You are an expert content analyst. You categorize web pages and describe their meaning, not just their keywords.

Always respond with a single JSON object with this structure:
{
  "primary_category": "category_name",
  "secondary_categories": ["category1", "category2"],
  "category_confidence": 0.95,
  "content_summary": "Brief summary of the content",
  "key_insights": ["insight1", "insight2"],
  "semantic_analysis": {
    "main_topics": ["topic1", "topic2"],
    "entities": [{"name": "entity", "type": "PERSON|ORG|LOCATION|...", "relevance": 0.8}],
    "themes": ["theme1", "theme2"],
    "semantic_keywords": ["keyword1", "keyword2"]
  },
  "sentiment": {
    "overall": "positive|negative|neutral|mixed",
    "confidence": 0.85,
    "emotions": {"joy": 0.3, "trust": 0.4}
  },
  "content_quality_score": 0.88,
  "readability_score": 0.75
}

Scores are between 0.0 and 1.0. Category names are lowercase words or underscore_separated phrases such as "news", "technology", "product_review" or "documentation". Pick whatever category describes the page best; the list is not fixed."#;

/// System message sent with every analysis request
pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

/// Builds the user message for one page
///
/// Sections the caller switched off in `options` are listed as skipped so
/// the model can leave the matching JSON fields empty.
pub fn build_user_prompt(input: &AnalysisInput<'_>, options: &AnalysisOptions) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Analyze the following web page content from URL: {}\n",
        input.url
    ));
    prompt.push_str(&format!("Analysis depth required: {}\n", options.depth));

    if let Some(title) = input.title {
        prompt.push_str(&format!("Page title: {}\n", title));
    }
    if let Some(language) = input.language {
        prompt.push_str(&format!("Page language: {}\n", language));
    }
    if let Ok(metadata) = serde_json::to_string_pretty(input.metadata) {
        prompt.push_str(&format!("Page metadata: {}\n", metadata));
    }

    if !options.custom_categories.is_empty() {
        prompt.push_str(&format!(
            "Focus on these custom categories: {}\n",
            options.custom_categories.join(", ")
        ));
    }

    prompt.push_str("\nWeb page content:\n");
    prompt.push_str(RULE);
    prompt.push('\n');
    prompt.push_str(input.text);
    if input.truncated {
        prompt.push_str(TRUNCATION_MARKER);
    }
    prompt.push('\n');
    prompt.push_str(RULE);
    prompt.push_str("\n\n");

    let sections = [
        (options.include_category, "categorization with confidence scores"),
        (options.include_summary, "a summary and key insights"),
        (options.include_entities, "named entities with relevance"),
        (options.include_keywords, "topics, themes and semantic keywords"),
        (options.include_sentiment, "sentiment with emotional nuances"),
    ];

    prompt.push_str("Provide:\n");
    let mut n = 1;
    for (_, section) in sections.iter().filter(|(enabled, _)| *enabled) {
        prompt.push_str(&format!("{}. {}\n", n, section));
        n += 1;
    }
    prompt.push_str(&format!("{}. content quality and readability assessment\n", n));

    let skipped: Vec<&str> = sections
        .iter()
        .filter(|(enabled, _)| !*enabled)
        .map(|(_, section)| *section)
        .collect();
    if !skipped.is_empty() {
        prompt.push_str(&format!(
            "\nSkip {}; leave those fields empty.\n",
            skipped.join(" and ")
        ));
    }

    prompt
}
