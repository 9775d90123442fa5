//! HTML text and metadata extraction
//!
//! Reduces a page to the text a reader would see in its main content area,
//! and pulls the usual `<head>` metadata out alongside it.

use crate::fetch::PageMetadata;
use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose text never counts as page content
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "footer", "header", "noscript"];

/// Main-content candidates, tried in order
const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    "#content",
    ".content",
    "#main",
    ".main",
    ".post-content",
    ".entry-content",
];

/// Average reading speed used for reading time estimates
const WORDS_PER_MINUTE: f64 = 200.0;

/// A page reduced to its readable text and `<head>` metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    /// Main-content text with whitespace collapsed
    pub text: String,
    pub title: Option<String>,
    pub language: Option<String>,
    pub metadata: PageMetadata,
}

/// Parses an HTML document once and extracts its text and metadata
///
/// Text comes from the first main-content element found, falling back to
/// `<body>` and then the whole document. Word count and reading time are
/// computed from that text.
///
/// # Example
///
/// ```
/// use sumi_lens::fetch::extract_page;
///
/// let html = "<html><head><title>Hi</title></head><body><nav>Menu</nav><main><p>Hello   world</p></main></body></html>";
/// let page = extract_page(html);
/// assert_eq!(page.text, "Hello world");
/// assert_eq!(page.title.as_deref(), Some("Hi"));
/// ```
pub fn extract_page(html: &str) -> ExtractedPage {
    let document = Html::parse_document(html);
    let text = collapse_whitespace(&document_text(&document));
    let (title, language, metadata) = page_metadata(&document, &text);

    ExtractedPage {
        text,
        title,
        language,
        metadata,
    }
}

fn document_text(document: &Html) -> String {
    for selector in MAIN_SELECTORS {
        if let Some(element) = select_first(document, selector) {
            let text = element_text(element);
            if !text.trim().is_empty() {
                return text;
            }
        }
    }

    if let Some(body) = select_first(document, "body") {
        return element_text(body);
    }

    element_text(document.root_element())
}

fn select_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

/// Collects descendant text, skipping non-content subtrees
fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if SKIPPED_ELEMENTS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns `(title, language, metadata)`
fn page_metadata(document: &Html, text: &str) -> (Option<String>, Option<String>, PageMetadata) {
    let title = select_first(document, "title")
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty());

    let language = select_first(document, "html")
        .and_then(|el| el.value().attr("lang"))
        .map(|lang| lang.trim().to_string())
        .filter(|s| !s.is_empty());

    let description = meta_content(document, "meta[name='description']")
        .or_else(|| meta_content(document, "meta[property='og:description']"));

    let keywords = meta_content(document, "meta[name='keywords']")
        .map(|content| {
            content
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let author = meta_content(document, "meta[name='author']")
        .or_else(|| meta_content(document, "meta[property='article:author']"));

    let word_count = text.split_whitespace().count();

    let metadata = PageMetadata {
        description,
        keywords,
        author,
        word_count,
        reading_time_minutes: reading_time_minutes(word_count),
        ..PageMetadata::default()
    };

    (title, language, metadata)
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    select_first(document, selector)
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn reading_time_minutes(word_count: usize) -> usize {
    ((word_count as f64 / WORDS_PER_MINUTE).round() as usize).max(1)
}
