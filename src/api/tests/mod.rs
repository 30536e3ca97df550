use super::*;
use crate::config::{FetchConfig, RetryConfig};
use crate::source::testing::ScriptedSource;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;

mod jobs;

/// Test downloader backed by the scripted source: account "demo" with
/// two video posts, one captioned.
async fn create_test_downloader() -> (Arc<ReelDownloader>, tempfile::TempDir) {
    let source = ScriptedSource::with_public_account("demo")
        .push_post("a", Some("Lions at dawn #wildlife"))
        .push_post("b", None);
    create_test_downloader_with(source).await
}

async fn create_test_downloader_with(
    source: ScriptedSource,
) -> (Arc<ReelDownloader>, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().expect("tempdir");

    let mut config = Config::default();
    config.storage.download_dir = temp_dir.path().to_path_buf();
    config.fetch = FetchConfig {
        min_request_interval: Duration::ZERO,
        gate_jitter_min: Duration::ZERO,
        gate_jitter_max: Duration::ZERO,
        post_delay: Duration::ZERO,
    };
    config.retry = RetryConfig {
        max_retries: 0,
        base_delay: Duration::from_millis(1),
        backoff_multiplier: 3.0,
        jitter_min: Duration::ZERO,
        jitter_max: Duration::ZERO,
    };

    let downloader = Arc::new(ReelDownloader::with_source(config, Arc::new(source)));
    (downloader, temp_dir)
}

fn router_for(downloader: &Arc<ReelDownloader>) -> Router {
    let config = downloader.get_config();
    create_router(downloader.clone(), config)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_str = String::from_utf8(body.to_vec()).unwrap();

    assert!(body_str.contains("ok"));
    assert!(body_str.contains("0.1.0")); // Version from Cargo.toml
}

#[tokio::test]
async fn test_cors_enabled() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let mut config = (*downloader.get_config()).clone();
    config.api.cors_enabled = true;
    config.api.cors_origins = vec!["*".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_authentication_with_api_key() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let mut config = (*downloader.get_config()).clone();
    config.api.api_key = Some("test-secret-key".to_string());
    let app = create_router(downloader, Arc::new(config));

    // Without the key: 401
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // With a wrong key: 401
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-api-key", "wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // With the right key: 200
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-api-key", "test-secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_capabilities_endpoint_reports_backend() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/capabilities")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["source"]["configured"], true);
    assert_eq!(json["source"]["backend"], "scripted");
}

#[tokio::test]
async fn test_openapi_spec_is_served() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["paths"].get("/jobs").is_some());
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let mut config = (*downloader.get_config()).clone();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let downloader = downloader.clone();
        let config = config.clone();
        async move { start_api_server(downloader, config).await }
    });

    // Give it a moment to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    api_handle.abort();
}
