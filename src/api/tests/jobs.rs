//! Job endpoint tests: submission, snapshots, progress stream, results.

use super::*;
use crate::error::SourceError;
use crate::source::testing::ScriptedSource;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

fn submit_request(account: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/jobs")
        .header("content-type", "application/json")
        .body(Body::from(format!(r#"{{"account": "{account}"}}"#)))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Submit through the router and poll GET /jobs/:id until terminal.
async fn submit_and_wait(app: &Router, account: &str) -> (String, serde_json::Value) {
    let response = app.clone().oneshot(submit_request(account)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let submission = json_body(response).await;
    let task_id = submission["task_id"].as_str().unwrap().to_string();

    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/jobs/{task_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = json_body(response).await;
        let status = snapshot["status"].as_str().unwrap();
        if status == "done" || status == "error" {
            return (task_id, snapshot);
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("task {task_id} never reached a terminal state");
}

#[tokio::test]
async fn submit_returns_task_id_and_normalized_handle() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let response = app.oneshot(submit_request("@demo")).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let submission = json_body(response).await;
    assert_eq!(submission["handle"], "demo");
    assert_eq!(submission["task_id"].as_str().unwrap().len(), 8);
}

#[tokio::test]
async fn submit_with_profile_url_normalizes() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let response = app
        .oneshot(submit_request("https://instagram.com/demo/reels/?x=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(response).await["handle"], "demo");
}

#[tokio::test]
async fn submit_with_blank_reference_is_a_client_error() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let response = app.oneshot(submit_request("  ")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error = json_body(response).await;
    assert_eq!(error["error"]["code"], "invalid_account_ref");
}

#[tokio::test]
async fn submit_without_backend_is_a_server_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.download_dir = temp_dir.path().to_path_buf();
    config.source.search_path = false;

    let downloader = Arc::new(ReelDownloader::new(config).await.unwrap());
    let app = router_for(&downloader);

    let response = app.oneshot(submit_request("demo")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"]["code"], "no_backend");
}

#[tokio::test]
async fn unknown_job_snapshot_is_404() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/jobs/deadbeef")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], "task_not_found");
}

#[tokio::test]
async fn list_jobs_contains_submitted_tasks() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let (task_id, _) = submit_and_wait(&app, "demo").await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/jobs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let jobs = json_body(response).await;
    let ids: Vec<&str> = jobs
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&task_id.as_str()));
}

#[tokio::test]
async fn end_to_end_submit_then_download_result() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let (task_id, snapshot) = submit_and_wait(&app, "demo").await;
    assert_eq!(snapshot["status"], "done");
    assert_eq!(snapshot["progress"], 100);
    assert_eq!(snapshot["total"], 2);
    assert_eq!(snapshot["downloaded"], 2);
    assert_eq!(snapshot["result"]["file_name"], "demo_reels.zip");

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/jobs/{task_id}/result"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/zip"
    );
    assert_eq!(
        response.headers()["content-disposition"].to_str().unwrap(),
        "attachment; filename=\"demo_reels.zip\""
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..2], b"PK", "the payload must be a zip archive");
}

#[tokio::test]
async fn failed_job_surfaces_error_through_snapshot() {
    let source = ScriptedSource::new(Err(SourceError::NotFound("ghost".to_string())));
    let (downloader, _temp_dir) = create_test_downloader_with(source).await;
    let app = router_for(&downloader);

    let (_, snapshot) = submit_and_wait(&app, "ghost").await;
    assert_eq!(snapshot["status"], "error");
    assert!(
        snapshot["error"]
            .as_str()
            .unwrap()
            .contains("does not exist")
    );
}

#[tokio::test]
async fn result_of_unknown_task_is_404() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/jobs/deadbeef/result")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn result_of_failed_task_is_not_ready() {
    let source = ScriptedSource::new(Err(SourceError::NotFound("ghost".to_string())));
    let (downloader, _temp_dir) = create_test_downloader_with(source).await;
    let app = router_for(&downloader);

    let (task_id, _) = submit_and_wait(&app, "ghost").await;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/jobs/{task_id}/result"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"]["code"], "not_ready");
}

#[tokio::test]
async fn progress_stream_for_unknown_task_ends_with_error_frame() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/jobs/deadbeef/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    // The stream terminates after the single error frame, so the body
    // can be read to completion.
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("event: error"));
    assert!(text.contains("task_not_found"));
}

#[tokio::test]
async fn progress_stream_delivers_frames_until_terminal() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let response = app
        .clone()
        .oneshot(submit_request("demo"))
        .await
        .unwrap();
    let task_id = json_body(response).await["task_id"]
        .as_str()
        .unwrap()
        .to_string();

    // The stream ends when the task reaches a terminal state, so the
    // whole body is readable; it must carry the log lines exactly once.
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/jobs/{task_id}/events"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        axum::body::to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("stream must end once the task is terminal")
    .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("event: progress"));
    assert!(text.contains("Fetching profile @demo"));
    assert!(
        text.matches("Found 2 video posts").count() == 1,
        "log lines must never repeat across frames"
    );
    assert!(text.contains("\"status\":\"done\""));
    assert!(text.contains("demo_reels.zip"));
}
