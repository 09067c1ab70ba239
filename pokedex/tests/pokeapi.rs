//! Integration tests for the `PokeAPI` client against a mock server

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use pagestore_core::{FetchError, PageAction, PageFetcher};
use pagestore_runtime::Store;
use pagestore_testing::Recorder;
use pokedex::{PokeApiClient, PokedexConfig, Pokemon};
use serde_json::json;
use std::time::Duration;
use tokio_test::assert_ok;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test Fixtures
// ============================================================================

fn client_for(server: &MockServer) -> PokeApiClient {
    let config = PokedexConfig {
        api_base_url: format!("{}/", server.uri()),
        request_timeout_secs: 2,
        ..PokedexConfig::default()
    };
    assert_ok!(PokeApiClient::new(&config))
}

fn entry(id: u32, name: &str) -> serde_json::Value {
    json!({ "name": name, "url": format!("https://pokeapi.co/api/v2/pokemon/{id}/") })
}

fn page_body(count: u64, entries: &[serde_json::Value]) -> serde_json::Value {
    json!({
        "count": count,
        "next": null,
        "previous": null,
        "results": entries,
    })
}

async fn mount_page(server: &MockServer, limit: &str, offset: &str, entries: &[serde_json::Value]) {
    Mock::given(method("GET"))
        .and(path("/pokemon"))
        .and(query_param("limit", limit))
        .and(query_param("offset", offset))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1302, entries)))
        .expect(1)
        .mount(server)
        .await;
}

// ============================================================================
// Client
// ============================================================================

#[tokio::test]
async fn test_get_page_sends_window_and_parses_results() {
    let server = MockServer::start().await;
    mount_page(&server, "10", "0", &[entry(1, "bulbasaur"), entry(2, "ivysaur")]).await;

    let client = client_for(&server);
    assert_eq!(client.api_url(), server.uri());

    let page = client.get_page(10, 0).await.unwrap();
    assert_eq!(page.count, 1302);
    let names: Vec<&str> = page.results.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["bulbasaur", "ivysaur"]);
    assert_eq!(page.results[1].id(), Some(2));
}

#[tokio::test]
async fn test_negative_window_is_forwarded_unchanged() {
    let server = MockServer::start().await;
    mount_page(&server, "-5", "-10", &[]).await;

    let items = client_for(&server).fetch_page(-5, -10).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_error_status_maps_to_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pokemon"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    let error = client_for(&server).fetch_page(10, 0).await.unwrap_err();
    assert_eq!(
        error,
        FetchError::Status {
            status: 503,
            message: "try later".to_string()
        }
    );
}

#[tokio::test]
async fn test_malformed_body_maps_to_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pokemon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pokemon": [] })))
        .mount(&server)
        .await;

    let error = client_for(&server).fetch_page(10, 0).await.unwrap_err();
    assert!(matches!(error, FetchError::Decode(_)), "got {error:?}");
}

#[tokio::test]
async fn test_unreachable_server_maps_to_transport_error() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    drop(server);

    let error = client.fetch_page(10, 0).await.unwrap_err();
    assert!(matches!(error, FetchError::Transport(_)), "got {error:?}");
}

// ============================================================================
// Store over HTTP
// ============================================================================

#[tokio::test]
async fn test_store_pages_through_the_list() {
    let server = MockServer::start().await;
    mount_page(&server, "2", "0", &[entry(1, "bulbasaur"), entry(2, "ivysaur")]).await;
    mount_page(&server, "2", "2", &[entry(3, "venusaur"), entry(4, "charmander")]).await;

    let store = assert_ok!(Store::with_config(
        client_for(&server),
        pagestore_runtime::StoreConfig::default().with_initial_limit(2),
    ));
    let pages = Recorder::<std::sync::Arc<[Pokemon]>>::new();
    let _pages = store.items().subscribe(pages.observer());

    for step in 0..2 {
        if step > 0 {
            store.increase_offset(2);
        }
        let outcome = store
            .send_and_wait_for(PageAction::RequestLoad, PageAction::is_load_outcome, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(matches!(outcome, PageAction::LoadSucceeded(_)), "got {outcome:?}");
    }

    let names: Vec<Vec<String>> = pages
        .values()
        .iter()
        .map(|page| page.iter().map(|p| p.name.clone()).collect())
        .collect();
    assert_eq!(
        names,
        vec![
            vec![],
            vec!["bulbasaur".to_string(), "ivysaur".to_string()],
            vec!["venusaur".to_string(), "charmander".to_string()],
        ]
    );
    server.verify().await;
}

#[tokio::test]
async fn test_store_survives_http_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pokemon"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "10", "10", &[entry(11, "metapod")]).await;

    let store = assert_ok!(Store::new(client_for(&server)));

    let outcome = store
        .send_and_wait_for(PageAction::RequestLoad, PageAction::is_load_outcome, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        PageAction::LoadFailed(FetchError::Status { status: 500, .. })
    ));
    assert!(store.items().latest().is_empty());

    store.increase_offset(10);
    store
        .send_and_wait_for(PageAction::RequestLoad, PageAction::is_load_outcome, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(store.items().latest()[0].name, "metapod");
}
