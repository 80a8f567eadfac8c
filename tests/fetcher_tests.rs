// StatusFetcher tests against a mock Icecast server

mod common;

use httpmock::prelude::*;
use listener_archive::config::UpstreamConfig;
use listener_archive::fetcher::StatusFetcher;
use listener_archive::status_parser::ContentKind;

fn fetcher() -> StatusFetcher {
    let config = UpstreamConfig {
        timeout_secs: 5,
        ..UpstreamConfig::default()
    };
    StatusFetcher::new(&config).unwrap()
}

#[tokio::test]
async fn json_status_is_used_when_it_lists_mounts() {
    let server = MockServer::start_async().await;
    let json = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/status-json.xsl")
                .header("user-agent", "NopherosListenerScraper/2.0");
            then.status(200)
                .header("content-type", "application/json")
                .body(common::STATUS_JSON);
        })
        .await;
    let html = server
        .mock_async(|when, then| {
            when.method(GET).path("/status.xsl");
            then.status(200).body(common::STATUS_HTML);
        })
        .await;

    let outcome = fetcher().fetch(&server.base_url()).await;
    assert_eq!(outcome.strategy, Some(ContentKind::Json));
    assert_eq!(outcome.strategy_name(), "json");
    assert_eq!(outcome.mounts["/tower1"].listeners, 12);
    assert!(outcome.failures.is_empty());
    json.assert_async().await;
    assert_eq!(html.hits_async().await, 0);
}

#[tokio::test]
async fn empty_json_falls_back_to_html() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/status-json.xsl");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"icestats": {"host": "radio"}}"#);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/status.xsl");
            then.status(200)
                .header("content-type", "text/html")
                .body(common::STATUS_HTML);
        })
        .await;

    let outcome = fetcher().fetch(&server.base_url()).await;
    assert_eq!(outcome.strategy, Some(ContentKind::Html));
    assert_eq!(outcome.mounts["/tower1"].listeners, 42);
    assert_eq!(outcome.mounts["/tower2"].listeners, 3);
    assert_eq!(outcome.failures, vec!["json: no mounts".to_string()]);
}

#[tokio::test]
async fn json_server_error_falls_back_to_html() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/status-json.xsl");
            then.status(500);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/status.xsl");
            then.status(200).body(common::STATUS_HTML);
        })
        .await;

    let outcome = fetcher().fetch(&server.base_url()).await;
    assert_eq!(outcome.strategy, Some(ContentKind::Html));
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].contains("500"), "{:?}", outcome.failures);
}

#[tokio::test]
async fn undecodable_json_falls_back_to_html() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/status-json.xsl");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html>maintenance</html>");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/status.xsl");
            then.status(200).body(common::STATUS_HTML);
        })
        .await;

    let outcome = fetcher().fetch(&server.base_url()).await;
    assert_eq!(outcome.strategy, Some(ContentKind::Html));
    assert!(outcome.failures[0].starts_with("json:"));
}

#[tokio::test]
async fn both_endpoints_failing_yields_no_mounts() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/status-json.xsl");
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/status.xsl");
            then.status(200).body("<html><body>nothing here</body></html>");
        })
        .await;

    let outcome = fetcher().fetch(&server.base_url()).await;
    assert_eq!(outcome.strategy, None);
    assert_eq!(outcome.strategy_name(), "none");
    assert!(outcome.mounts.is_empty());
    assert_eq!(outcome.failures.len(), 2);
    assert_eq!(outcome.failures[1], "html: no mounts");
}

#[tokio::test]
async fn unreachable_server_yields_no_mounts() {
    // Port 9 (discard) is closed on test hosts.
    let outcome = fetcher().fetch("http://127.0.0.1:9").await;
    assert_eq!(outcome.strategy, None);
    assert!(outcome.mounts.is_empty());
    assert_eq!(outcome.failures.len(), 2);
}

#[tokio::test]
async fn later_servers_override_earlier_ones() {
    let first = MockServer::start_async().await;
    first
        .mock_async(|when, then| {
            when.method(GET).path("/status-json.xsl");
            then.status(200).body(common::STATUS_JSON);
        })
        .await;
    let second = MockServer::start_async().await;
    second
        .mock_async(|when, then| {
            when.method(GET).path("/status-json.xsl");
            then.status(200).body(
                r#"{"icestats": {"source": {"listenurl": "http://b:8000/tower1", "listeners": 2}}}"#,
            );
        })
        .await;

    let (mounts, outcomes) = fetcher()
        .fetch_all(&[first.base_url(), second.base_url()])
        .await;
    assert_eq!(outcomes.len(), 2);
    assert_eq!(mounts["/tower1"].listeners, 2);
    assert_eq!(mounts["/tower2"].listeners, 7);
}
