//! URL syntax validation
//!
//! A URL is accepted when it is absolute, uses `http` or `https`, and names a
//! host. Anything else is rejected before the fetcher ever sees it.

use crate::UrlError;
use url::Url;

/// Validates a URL string and returns the parsed URL
///
/// Surrounding whitespace is ignored.
///
/// # Examples
///
/// ```
/// use sumi_lens::url::validate_url;
///
/// assert!(validate_url("https://example.com/page").is_ok());
/// assert!(validate_url("not-a-url").is_err());
/// ```
pub fn validate_url(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Parse("empty URL".to_string()));
    }

    let url = Url::parse(trimmed).map_err(|e| UrlError::Parse(format!("{}: {}", trimmed, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(other.to_string())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingHost),
    }
}
