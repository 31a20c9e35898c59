use numbreacher::config::OwnerLookupConfig;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock search endpoint is served under
pub const SEARCH_PATH: &str = "/html/";

/// Builds a DuckDuckGo-style HTML results page with one `a.result__a` per title.
pub fn results_page(titles: &[&str]) -> String {
    let results: String = titles
        .iter()
        .map(|title| {
            format!(
                r#"<div class="result results_links"><h2 class="result__title"><a rel="nofollow" class="result__a" href="https://example.com/{}">{}</a></h2></div>"#,
                title.len(),
                title
            )
        })
        .collect();
    format!("<!DOCTYPE html><html><body><div id=\"links\">{}</div></body></html>", results)
}

/// The exact `q` value the resolver sends for a number key and query term
pub fn search_query(key: &str, term: &str) -> String {
    format!("\"{}\" \"{}\"", key, term)
}

/// Owner-lookup settings pointing at a mock server
pub fn lookup_config(server: &MockServer, timeout_secs: u64) -> OwnerLookupConfig {
    OwnerLookupConfig {
        search_url: format!("{}{}", server.uri(), SEARCH_PATH),
        timeout_secs,
        ..OwnerLookupConfig::default()
    }
}

/// Creates a mock search server answering every query with the same titles.
pub async fn mock_search_server(titles: &[&str]) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(results_page(titles))
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    server
}

/// Mounts a response for one specific query on an existing server.
pub async fn mount_query(server: &MockServer, query: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("q", query))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Creates a mock HTTP server that delays responses to simulate network timeouts.
pub async fn mock_timeout_server(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(results_page(&["Too Late"]))
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that returns the specified HTTP error status code.
pub async fn mock_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code))
        .mount(&server)
        .await;

    server
}
