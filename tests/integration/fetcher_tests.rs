//! HttpFetcher against a mock server

use std::time::Duration;
use sumi_lens::config::FetcherConfig;
use sumi_lens::fetch::{ContentFetcher, HttpFetcher};
use sumi_lens::retry::FailureKind;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> HttpFetcher {
    let config = FetcherConfig {
        timeout_secs: 5,
        connect_timeout_secs: 2,
        ..FetcherConfig::default()
    };
    HttpFetcher::new(&config).unwrap()
}

fn page_url(server: &MockServer, page: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), page)).unwrap()
}

#[tokio::test]
async fn test_fetch_html_page() {
    let server = MockServer::start().await;
    let html = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <title>Rust Weekly</title>
    <meta name="description" content="News about Rust">
</head>
<body>
    <nav>Home | About</nav>
    <article><h1>Release notes</h1><p>The compiler got faster again.</p></article>
    <script>console.log("ignored");</script>
</body>
</html>"#;

    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .mount(&server)
        .await;

    let content = fetcher().fetch(&page_url(&server, "/article")).await.unwrap();

    assert_eq!(content.title.as_deref(), Some("Rust Weekly"));
    assert_eq!(content.language.as_deref(), Some("en"));
    assert!(content.raw_text.contains("The compiler got faster again."));
    assert!(!content.raw_text.contains("console.log"));
    assert_eq!(content.metadata.description.as_deref(), Some("News about Rust"));
    assert!(content.metadata.word_count > 0);
    assert!(content
        .metadata
        .content_type
        .as_deref()
        .unwrap()
        .starts_with("text/html"));
}

#[tokio::test]
async fn test_fetch_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("line one\n\nline   two", "text/plain"))
        .mount(&server)
        .await;

    let content = fetcher().fetch(&page_url(&server, "/notes.txt")).await.unwrap();

    assert_eq!(content.raw_text, "line one line two");
    assert_eq!(content.title, None);
    assert_eq!(content.metadata.word_count, 4);
}

#[tokio::test]
async fn test_not_found_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let failure = fetcher().fetch(&page_url(&server, "/missing")).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::Permanent);
    assert!(failure.message.contains("404"));
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let failure = fetcher().fetch(&page_url(&server, "/busy")).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::Transient);
    assert_eq!(failure.retry_after, None);
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let failure = fetcher().fetch(&page_url(&server, "/limited")).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::RateLimited);
    assert_eq!(failure.retry_after, Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn test_binary_content_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x25, 0x50, 0x44, 0x46], "application/pdf"))
        .mount(&server)
        .await;

    let failure = fetcher().fetch(&page_url(&server, "/report.pdf")).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::Permanent);
    assert!(failure.message.contains("application/pdf"));
}

#[tokio::test]
async fn test_follows_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html><body><p>Moved here</p></body></html>", "text/html"))
        .mount(&server)
        .await;

    let content = fetcher().fetch(&page_url(&server, "/old")).await.unwrap();

    assert!(content.raw_text.contains("Moved here"));
    assert!(content.metadata.final_url.as_deref().unwrap().ends_with("/new"));
}
