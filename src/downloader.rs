//! Core orchestrator
//!
//! `ReelDownloader` owns the shared pieces: the configuration, the task
//! registry, the process-wide rate gate, the selected media source
//! backend, and the shutdown token. Submissions are non-blocking: the
//! task identifier is returned as soon as the record exists, before any
//! remote call, and one independent job runner is spawned per task with
//! no implicit join — the registry is the only channel between a
//! runner and its observers.

use crate::config::Config;
use crate::error::{Error, Result, TaskError};
use crate::rate_gate::RateGate;
use crate::registry::TaskRegistry;
use crate::runner::JobRunner;
use crate::source::{self, MediaSource};
use crate::types::{
    Capabilities, ProgressFrame, ResultArtifact, SourceCapabilities, TaskId, TaskSnapshot,
};
use crate::utils::normalize_handle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

/// Response to an accepted submission
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Submission {
    /// Identifier of the created task
    pub task_id: TaskId,
    /// The normalized handle the task will archive
    pub handle: String,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ReelDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// The single shared mutable structure holding all live tasks
    registry: Arc<TaskRegistry>,
    /// Process-wide pacing gate shared by all job runners
    gate: RateGate,
    /// Selected media source backend; None rejects submissions
    media_source: Option<Arc<dyn MediaSource>>,
    /// Cancellation root honored by every runner at suspension points
    shutdown: CancellationToken,
}

impl ReelDownloader {
    /// Create a new downloader instance
    ///
    /// Ensures the download directory exists and selects the media
    /// source backend from the configuration.
    pub async fn new(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.storage.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create download directory '{}': {}",
                        config.storage.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let media_source = source::select_source(&config.source)?;
        Ok(Self::assemble(config, media_source))
    }

    /// Create a downloader with an embedder-provided media source
    ///
    /// Bypasses backend selection; useful for custom backends and for
    /// tests. The download directory is created lazily on submission.
    pub fn with_source(config: Config, media_source: Arc<dyn MediaSource>) -> Self {
        Self::assemble(config, Some(media_source))
    }

    fn assemble(config: Config, media_source: Option<Arc<dyn MediaSource>>) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(TaskRegistry::new()),
            gate: RateGate::new(),
            media_source,
            shutdown: CancellationToken::new(),
        }
    }

    /// Submit a new job for a free-form account reference
    ///
    /// Normalizes the reference (`handle`, `@handle` or profile URL),
    /// creates the task record, and spawns its runner. Returns as soon
    /// as the record exists - before any remote call. Expired tasks are
    /// swept opportunistically first.
    pub async fn submit(&self, account_ref: &str) -> Result<Submission> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        self.sweep_expired().await;

        let handle = normalize_handle(account_ref)?;
        let media_source = self.media_source.clone().ok_or(Error::NoBackend)?;

        let task_id = TaskId::generate();
        let task_dir = self.config.storage.download_dir.join(task_id.as_str());
        tokio::fs::create_dir_all(&task_dir).await?;

        self.registry
            .create(task_id.clone(), &handle, task_dir.clone())
            .await;

        let runner = JobRunner::new(
            task_id.clone(),
            handle.clone(),
            task_dir,
            self.registry.clone(),
            media_source,
            self.config.clone(),
            self.gate.clone(),
            self.shutdown.child_token(),
        );
        tokio::spawn(runner.run());

        tracing::info!(task_id = %task_id, handle = %handle, "job submitted");
        Ok(Submission { task_id, handle })
    }

    /// Evict expired tasks and delete their directories
    ///
    /// Directory removal happens outside the registry lock.
    async fn sweep_expired(&self) {
        let expired = self
            .registry
            .sweep_expired(self.config.storage.task_ttl)
            .await;

        for (task_id, dir) in expired {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(task_id = %task_id, error = %e, "failed to remove expired task directory");
                }
            }
        }
    }

    /// Snapshot of one task
    pub async fn snapshot(&self, task_id: &TaskId) -> Option<TaskSnapshot> {
        self.registry.snapshot(task_id).await
    }

    /// Snapshots of all live tasks, newest first
    pub async fn snapshots(&self) -> Vec<TaskSnapshot> {
        self.registry.snapshots().await
    }

    /// One progress frame for a task, starting at `cursor`
    ///
    /// Returns `None` for unknown (or evicted) tasks.
    pub async fn progress_frame(&self, task_id: &TaskId, cursor: usize) -> Option<ProgressFrame> {
        self.registry.frame(task_id, cursor).await
    }

    /// The task's wakeup handle for progress streaming
    pub async fn progress_notifier(&self, task_id: &TaskId) -> Option<Arc<Notify>> {
        self.registry.notifier(task_id).await
    }

    /// Locate the packaged result of a finished task
    ///
    /// # Errors
    ///
    /// `TaskError::NotFound` for unknown tasks, `TaskError::NotReady`
    /// before the done state, `TaskError::ResultMissing` when the
    /// archive has vanished from disk.
    pub async fn result_file(&self, task_id: &TaskId) -> Result<ResultArtifact> {
        let snapshot = self
            .snapshot(task_id)
            .await
            .ok_or_else(|| TaskError::NotFound {
                id: task_id.to_string(),
            })?;

        let artifact = match (snapshot.status, snapshot.result) {
            (crate::types::TaskStatus::Done, Some(artifact)) => artifact,
            (status, _) => {
                return Err(TaskError::NotReady {
                    id: task_id.to_string(),
                    status: status.to_string(),
                }
                .into());
            }
        };

        if !tokio::fs::try_exists(&artifact.path).await.unwrap_or(false) {
            return Err(TaskError::ResultMissing {
                id: task_id.to_string(),
            }
            .into());
        }

        Ok(artifact)
    }

    /// Query the current system capabilities
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            source: SourceCapabilities {
                configured: self.media_source.is_some(),
                backend: self.media_source.as_ref().map(|s| s.name().to_string()),
            },
        }
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Initiate graceful shutdown
    ///
    /// New submissions are rejected and every running job runner
    /// observes the cancellation at its next suspension point and
    /// terminates its task. Jobs are not awaited; there is no implicit
    /// join.
    pub fn shutdown(&self) {
        tracing::info!("shutdown initiated, cancelling running jobs");
        self.shutdown.cancel();
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server runs concurrently with job processing and listens on
    /// the configured bind address (default: 127.0.0.1:6789).
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
