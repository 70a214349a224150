//! End-to-end routing through the reqwest-backed fetcher.

use std::sync::Arc;

use birdnet_common::BlobStore;
use birdnet_sw::{
    CacheEntry, FetchOutcome, FetchRequest, FetchResponse, HttpFetcher, PathMatcher,
    RegistrationOptions, Route, ServiceWorkerContainer, Strategy, WorkerScript,
};
use http::Method;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Port nothing listens on, for network failures.
const UNREACHABLE: &str = "http://127.0.0.1:1";

fn script(server: &MockServer, cache_name: &str) -> WorkerScript {
    WorkerScript {
        cache_name: cache_name.to_string(),
        routes: vec![
            Route::new(
                &server.uri(),
                PathMatcher::Exact("/api2/requeststats".to_string()),
                Strategy::NetworkFirst,
            ),
            Route::new(
                &server.uri(),
                PathMatcher::Prefix("/api2/bird/".to_string()),
                Strategy::CacheFirst,
            ),
            Route::new(
                UNREACHABLE,
                PathMatcher::Exact("/api2/requeststats".to_string()),
                Strategy::NetworkFirst,
            ),
        ],
        default_strategy: Strategy::StaleWhileRevalidate,
    }
}

async fn registered(server: &MockServer, cache_name: &str) -> ServiceWorkerContainer {
    let page = Url::parse(&format!("{}/live/index.html", server.uri())).unwrap();
    let fetcher = Arc::new(HttpFetcher::new().unwrap());
    let (container, _events) = ServiceWorkerContainer::new(page.clone(), fetcher, BlobStore::new(&page));
    register(&container, script(server, cache_name)).await;
    container
}

async fn register(container: &ServiceWorkerContainer, script: WorkerScript) {
    let url = container
        .blobs()
        .create_object_url(script.to_blob().unwrap())
        .unwrap();
    container
        .register(&url, RegistrationOptions::default())
        .await
        .unwrap();
}

async fn fetch(container: &ServiceWorkerContainer, url: &str) -> FetchResponse {
    let request = FetchRequest::get(Url::parse(url).unwrap());
    match container.handle_fetch(&request).await.unwrap() {
        FetchOutcome::Responded(response) => response,
        FetchOutcome::Passthrough(reason) => panic!("{url} passed through: {reason}"),
    }
}

#[tokio::test]
async fn network_first_returns_fresh_data_and_caches_it() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api2/requeststats"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"observations":1200}"#))
        .expect(2)
        .mount(&server)
        .await;
    let container = registered(&server, "v1").await;
    let url = format!("{}/api2/requeststats", server.uri());

    let first = fetch(&container, &url).await;
    let second = fetch(&container, &url).await;

    assert_eq!(first.status, 200);
    assert_eq!(&first.body[..], br#"{"observations":1200}"#);
    assert!(!second.from_cache);
    assert!(container.caches.read().await.get("v1").unwrap().match_request(&url).is_some());
}

#[tokio::test]
async fn network_first_caches_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api2/requeststats"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    let container = registered(&server, "v1").await;
    let url = format!("{}/api2/requeststats", server.uri());

    let response = fetch(&container, &url).await;

    assert_eq!(response.status, 503);
    let caches = container.caches.read().await;
    assert_eq!(caches.match_request(&url).unwrap().status, 503);
}

#[tokio::test]
async fn network_first_falls_back_to_cache_when_unreachable() {
    let server = MockServer::start().await;
    let container = registered(&server, "v1").await;
    let url = format!("{UNREACHABLE}/api2/requeststats");

    let request = FetchRequest::get(Url::parse(&url).unwrap());
    assert!(container.handle_fetch(&request).await.is_err());

    let entry = CacheEntry::from_response(&request, FetchResponse::ok("cached stats"));
    container.caches.write().await.open("v1").put(&url, entry);

    let response = fetch(&container, &url).await;
    assert!(response.from_cache);
    assert_eq!(&response.body[..], b"cached stats");
}

#[tokio::test]
async fn cache_first_hits_network_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api2/bird/Cyanistes_caeruleus.webp"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x52, 0x49, 0x46, 0x46]))
        .expect(1)
        .mount(&server)
        .await;
    let container = registered(&server, "v1").await;
    let url = format!("{}/api2/bird/Cyanistes_caeruleus.webp", server.uri());

    let first = fetch(&container, &url).await;
    let second = fetch(&container, &url).await;

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.body, second.body);
}

#[tokio::test]
async fn stale_while_revalidate_serves_cached_then_refreshed_copy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live/app.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("build 1"))
        .mount(&server)
        .await;
    let container = registered(&server, "v1").await;
    let url = format!("{}/live/app.js", server.uri());

    // Miss: waits for the network.
    assert_eq!(&fetch(&container, &url).await.body[..], b"build 1");

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/live/app.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("build 2"))
        .mount(&server)
        .await;

    let stale = fetch(&container, &url).await;
    assert!(stale.from_cache);
    assert_eq!(&stale.body[..], b"build 1");

    let worker = container.controller(container.page_url()).await.unwrap();
    worker.wait_until_idle().await;

    assert_eq!(&fetch(&container, &url).await.body[..], b"build 2");
    worker.wait_until_idle().await;
}

#[tokio::test]
async fn non_get_and_foreign_requests_pass_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    let container = registered(&server, "v1").await;

    let post = FetchRequest::new(
        Method::POST,
        Url::parse(&format!("{}/api2/requeststats", server.uri())).unwrap(),
    );
    let foreign = FetchRequest::get(Url::parse("https://cdn.example.net/chart.js").unwrap());

    for request in [post, foreign] {
        let outcome = container.handle_fetch(&request).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough(_)));
    }
    assert!(container.caches.read().await.keys().is_empty());
}

#[tokio::test]
async fn activation_keeps_only_configured_generation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    let container = registered(&server, "v1").await;
    fetch(&container, &format!("{}/live/style.css", server.uri())).await;
    container.caches.write().await.open("v2");

    register(&container, script(&server, "v2")).await;

    assert_eq!(container.caches.read().await.keys(), vec!["v2".to_string()]);
    let worker = container.controller(container.page_url()).await.unwrap();
    assert_eq!(worker.cache_name(), "v2");
}
