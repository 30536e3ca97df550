//! Job management handlers: submission, inspection, progress, results.

use crate::api::AppState;
use crate::error::{ApiError, Error, TaskError};
use crate::types::TaskId;
use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use utoipa::ToSchema;

/// Fallback wakeup interval for progress streams
///
/// Frames are pushed immediately on task updates; the poll bound only
/// guards against a missed wakeup.
const PROGRESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Request body for submitting a job
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitJobRequest {
    /// Free-form account reference: bare handle, `@handle`, or profile URL
    pub account: String,
}

/// POST /jobs - Submit a new archiving job
#[utoipa::path(
    post,
    path = "/jobs",
    tag = "jobs",
    request_body = SubmitJobRequest,
    responses(
        (status = 202, description = "Job accepted", body = crate::downloader::Submission),
        (status = 400, description = "Empty or unparsable account reference"),
        (status = 503, description = "No media source backend configured")
    )
)]
pub async fn submit_job(
    State(state): State<AppState>,
    Json(payload): Json<SubmitJobRequest>,
) -> Response {
    match state.downloader.submit(&payload.account).await {
        Ok(submission) => (StatusCode::ACCEPTED, Json(submission)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /jobs - List all live jobs
#[utoipa::path(
    get,
    path = "/jobs",
    tag = "jobs",
    responses(
        (status = 200, description = "Snapshots of all live jobs, newest first", body = Vec<crate::types::TaskSnapshot>)
    )
)]
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    let snapshots = state.downloader.snapshots().await;
    (StatusCode::OK, Json(snapshots))
}

/// GET /jobs/:id - Get a single job snapshot
#[utoipa::path(
    get,
    path = "/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Job snapshot", body = crate::types::TaskSnapshot),
        (status = 404, description = "Unknown task")
    )
)]
pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let task_id = TaskId::from(id);
    match state.downloader.snapshot(&task_id).await {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => Error::Task(TaskError::NotFound {
            id: task_id.to_string(),
        })
        .into_response(),
    }
}

/// State carried between progress stream frames
struct ProgressStreamState {
    app: AppState,
    task_id: TaskId,
    cursor: usize,
    first: bool,
    finished: bool,
}

/// GET /jobs/:id/events - Server-sent progress stream for one job
///
/// Each frame carries the current status and progress, the log lines
/// appended since the previous frame (never repeated), the counters,
/// and - once terminal - the error cause or the result name and size.
/// The stream ends exactly when the task reaches `done` or `error`; an
/// unknown task yields a single error frame and ends.
#[utoipa::path(
    get,
    path = "/jobs/{id}/events",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Server-sent progress stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn job_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let initial = ProgressStreamState {
        app: state,
        task_id: TaskId::from(id),
        cursor: 0,
        first: true,
        finished: false,
    };

    let stream = futures::stream::unfold(initial, |mut s| async move {
        if s.finished {
            return None;
        }

        if !s.first {
            // Wake on the task's notifier; the timeout bounds the wait
            // in case an update slipped through between frame and wait.
            match s.app.downloader.progress_notifier(&s.task_id).await {
                Some(notify) => {
                    let _ = tokio::time::timeout(PROGRESS_POLL_INTERVAL, notify.notified()).await;
                }
                None => {
                    // Evicted mid-stream; the frame lookup below ends us
                }
            }
        }
        s.first = false;

        match s.app.downloader.progress_frame(&s.task_id, s.cursor).await {
            Some(frame) => {
                s.cursor = frame.next_cursor;
                if frame.status.is_terminal() {
                    s.finished = true;
                }
                let event = match serde_json::to_string(&frame) {
                    Ok(json) => SseEvent::default().event("progress").data(json),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to serialize progress frame");
                        s.finished = true;
                        SseEvent::default()
                            .event("error")
                            .data(r#"{"error":{"code":"serialization_error"}}"#)
                    }
                };
                Some((Ok(event), s))
            }
            None => {
                s.finished = true;
                let payload = ApiError::new(
                    "task_not_found",
                    format!("task {} not found", s.task_id),
                );
                let data = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
                Some((Ok(SseEvent::default().event("error").data(data)), s))
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /jobs/:id/result - Download the packaged archive
///
/// Only serves tasks in the done state whose archive still exists on
/// disk; otherwise responds with a not-ready or not-found error.
#[utoipa::path(
    get,
    path = "/jobs/{id}/result",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "The result archive (application/zip)", content_type = "application/zip"),
        (status = 404, description = "Unknown task or expired archive"),
        (status = 409, description = "Task not finished yet")
    )
)]
pub async fn fetch_result(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let task_id = TaskId::from(id);
    let artifact = match state.downloader.result_file(&task_id).await {
        Ok(artifact) => artifact,
        Err(e) => return e.into_response(),
    };

    let file = match tokio::fs::File::open(&artifact.path).await {
        Ok(file) => file,
        Err(_) => {
            return Error::Task(TaskError::ResultMissing {
                id: task_id.to_string(),
            })
            .into_response();
        }
    };

    let body = axum::body::Body::from_stream(ReaderStream::new(file));
    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        ),
    ];

    (StatusCode::OK, headers, body).into_response()
}
