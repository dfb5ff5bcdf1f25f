//! Custom Search provider contract tests.
//!
//! Verify request parameters, response parsing and the transient/terminal
//! classification of HTTP failures against a local mock server.

use serde_json::json;
use vantage_search::types::ProviderOptions;
use vantage_search::{
    CustomSearchProvider, EngineConfig, ProviderConfig, SearchEngine, SearchOptions,
    SearchProvider,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_PATH: &str = "/customsearch/v1";

fn provider_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig {
        base_url: format!("{}{API_PATH}", server.uri()),
        api_key: Some("test-key".into()),
        engine_id: Some("test-cx".into()),
        timeout_seconds: 5,
        user_agent: None,
    }
}

fn options() -> ProviderOptions {
    ProviderOptions {
        language: None,
        freshness_days: None,
        num_results: 10,
    }
}

fn two_items() -> serde_json::Value {
    json!({
        "kind": "customsearch#search",
        "items": [
            {
                "title": "The <b>Tokio</b> runtime",
                "link": "https://tokio.rs/tokio/tutorial",
                "snippet": "Tokio is an asynchronous runtime for Rust.",
                "pagemap": {"metatags": [{"og:updated_time": "2024-03-01T08:00:00+00:00"}]}
            },
            {
                "title": "tokio on docs.rs",
                "link": "https://docs.rs/tokio",
                "snippet": "API documentation for the tokio crate."
            }
        ]
    })
}

#[tokio::test]
async fn request_carries_credentials_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("key", "test-key"))
        .and(query_param("cx", "test-cx"))
        .and(query_param("q", "rust tokio"))
        .and(query_param("num", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(two_items()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = CustomSearchProvider::new(provider_config(&server)).expect("provider");
    let hits = provider.search("rust tokio", &options()).await.expect("search");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].link, "https://tokio.rs/tokio/tutorial");
    assert!(hits[0].published.is_some());
    assert!(hits[1].published.is_none());
}

#[tokio::test]
async fn language_and_freshness_become_lr_and_date_restrict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("lr", "lang_fa"))
        .and(query_param("dateRestrict", "d7"))
        .and(query_param("num", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = CustomSearchProvider::new(provider_config(&server)).expect("provider");
    let opts = ProviderOptions {
        language: Some("fa".into()),
        freshness_days: Some(7),
        // Capped at the API's per-request maximum.
        num_results: 50,
    };
    let hits = provider.search("tehran weather", &opts).await.expect("search");
    assert!(hits.is_empty());
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let provider = CustomSearchProvider::new(provider_config(&server)).expect("provider");
    let err = provider.search("rust", &options()).await.unwrap_err();
    assert!(err.is_transient());
    assert!(err.message.contains("503"));
}

#[tokio::test]
async fn rate_limiting_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let provider = CustomSearchProvider::new(provider_config(&server)).expect("provider");
    assert!(provider.search("rust", &options()).await.unwrap_err().is_transient());
}

#[tokio::test]
async fn client_errors_are_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "Request contains an invalid argument."}
        })))
        .mount(&server)
        .await;

    let provider = CustomSearchProvider::new(provider_config(&server)).expect("provider");
    let err = provider.search("rust", &options()).await.unwrap_err();
    assert!(!err.is_transient());
    assert!(!err.message.contains("test-key"));
}

#[tokio::test]
async fn malformed_body_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
        .mount(&server)
        .await;

    let provider = CustomSearchProvider::new(provider_config(&server)).expect("provider");
    let err = provider.search("rust", &options()).await.unwrap_err();
    assert!(!err.is_transient());
}

#[tokio::test]
async fn engine_ranks_provider_hits_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(two_items()))
        .mount(&server)
        .await;

    let config = EngineConfig {
        provider: provider_config(&server),
        ..EngineConfig::default()
    };
    let engine = SearchEngine::builder(config).build().expect("engine");

    let response = engine
        .search("tokio runtime", &SearchOptions::default())
        .await
        .expect("search");

    assert!(!response.offline);
    assert_eq!(response.failed_variants, 0);
    assert_eq!(response.results.len(), 2);
    let tutorial = response
        .results
        .iter()
        .find(|r| r.link() == "https://tokio.rs/tokio/tutorial")
        .expect("tutorial result");
    assert_eq!(tutorial.result.title, "The Tokio runtime");
    assert_eq!(tutorial.result.source, "tokio.rs");
    assert!(tutorial.result.published.is_some());
    assert!(response.results.iter().all(|r| r.merged_duplicate));
}
