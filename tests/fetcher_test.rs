//! Integration tests for DocumentFetcher using wiremock
//!
//! These tests validate the HTTP fetcher's behavior with mock servers.

mod common;

use knowledge_extractor::loader::{DocumentFetcher, DocumentSource};
use knowledge_extractor::utils::error::FetchError;
use std::time::Duration;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::loader_config;

/// Test successful fetch from mock server
#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;
    let xml = common::opinion_xml("The court affirmed.", "Costs to appellee.");

    Mock::given(method("GET"))
        .and(path("/rawxml/I0f07d1"))
        .and(query_param("websitehost", "test"))
        .respond_with(ResponseTemplate::new(200).set_body_string(xml.clone()))
        .mount(&mock_server)
        .await;

    let fetcher = DocumentFetcher::with_config(&loader_config(&mock_server.uri(), 0)).unwrap();
    let body = fetcher.fetch_raw("I0f07d1").await.unwrap();

    assert_eq!(body, xml);
}

/// Test that server errors trigger retries
#[tokio::test]
async fn test_server_error_retry() {
    let mock_server = MockServer::start().await;

    // Return 503 twice, then succeed
    Mock::given(method("GET"))
        .and(path("/rawxml/g1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rawxml/g1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<d/>"))
        .mount(&mock_server)
        .await;

    let fetcher = DocumentFetcher::with_config(&loader_config(&mock_server.uri(), 3)).unwrap();
    let result = fetcher.fetch_raw("g1").await;

    assert!(result.is_ok(), "Should succeed after retries: {:?}", result.err());
}

/// Test that rate limiting answers are retried
#[tokio::test]
async fn test_too_many_requests_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rawxml/busy"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rawxml/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<d/>"))
        .mount(&mock_server)
        .await;

    let fetcher = DocumentFetcher::with_config(&loader_config(&mock_server.uri(), 3)).unwrap();
    assert_eq!(fetcher.fetch_raw("busy").await.unwrap(), "<d/>");
}

/// Test that every 5xx status is retried
#[tokio::test]
async fn test_not_implemented_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rawxml/g501"))
        .respond_with(ResponseTemplate::new(501))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = DocumentFetcher::with_config(&loader_config(&mock_server.uri(), 2)).unwrap();
    let result = fetcher.fetch_raw("g501").await;

    assert!(matches!(result, Err(FetchError::ServerError(501))));
}

/// Test GUIDs are percent-encoded as a path segment
#[tokio::test]
async fn test_guid_path_encoding() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rawxml/a%20b%2Fc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<d/>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = DocumentFetcher::with_config(&loader_config(&mock_server.uri(), 0)).unwrap();
    assert_eq!(
        fetcher.document_url("a b/c").unwrap().path(),
        "/rawxml/a%20b%2Fc"
    );
    assert_eq!(fetcher.fetch_raw("a b/c").await.unwrap(), "<d/>");
}

/// Test 404 does not retry
#[tokio::test]
async fn test_404_no_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rawxml/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = DocumentFetcher::with_config(&loader_config(&mock_server.uri(), 3)).unwrap();
    let result = fetcher.fetch_raw("missing").await;

    assert!(matches!(result, Err(FetchError::ServerError(404))));
}

/// Test the last error is returned once retries run out
#[tokio::test]
async fn test_max_retries_exceeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rawxml/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = DocumentFetcher::with_config(&loader_config(&mock_server.uri(), 2)).unwrap();
    let result = fetcher.fetch_raw("flaky").await;

    assert!(matches!(result, Err(FetchError::ServerError(503))));
}

/// Test charset from the Content-Type header
#[tokio::test]
async fn test_windows_1252_decoding() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rawxml/latin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"<d>caf\xe9</d>".to_vec())
                .insert_header("content-type", "text/xml; charset=windows-1252"),
        )
        .mount(&mock_server)
        .await;

    let fetcher = DocumentFetcher::with_config(&loader_config(&mock_server.uri(), 0)).unwrap();
    let body = fetcher.fetch_raw("latin").await.unwrap();

    assert_eq!(body, "<d>caf\u{e9}</d>");
}

/// Test User-Agent header is set
#[tokio::test]
async fn test_user_agent_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rawxml/ua"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<d/>"))
        .mount(&mock_server)
        .await;

    let fetcher = DocumentFetcher::with_config(&loader_config(&mock_server.uri(), 0)).unwrap();
    assert!(fetcher.fetch_raw("ua").await.is_ok());
}

/// Test rate limiting respects configured limit
#[tokio::test]
async fn test_rate_limiting() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<d/>"))
        .mount(&mock_server)
        .await;

    let mut config = loader_config(&mock_server.uri(), 0);
    config.rate_limit = 2;
    let fetcher = DocumentFetcher::with_config(&config).unwrap();

    let start = std::time::Instant::now();
    for guid in ["a", "b", "c"] {
        fetcher.fetch_raw(guid).await.unwrap();
    }

    // The third request has to wait for the quota to refill
    assert!(start.elapsed() >= Duration::from_millis(400));
}

/// Test a template without placeholder is rejected
#[test]
fn test_template_without_placeholder() {
    let mut config = loader_config("http://localhost", 0);
    config.url_template = "http://localhost/rawxml".to_string();

    assert!(matches!(
        DocumentFetcher::with_config(&config),
        Err(FetchError::InvalidUrl(_))
    ));
}
