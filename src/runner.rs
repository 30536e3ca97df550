//! Job runner: the per-task state machine
//!
//! One runner drives one task through
//! `fetching → scanning → downloading → packaging → done`, invoking the
//! retry executor and the shared rate gate around every remote call,
//! appending human-readable log lines, and keeping the progress
//! percentage monotone. Each phase owns a disjoint slice of the 0-100
//! scale: fetching 0-10, scanning 10-20, downloading 20-90, packaging
//! 90-99, done 100.
//!
//! Phases execute strictly sequentially inside one spawned task; post
//! downloads are intentionally serialized, each separated by a pacing
//! delay, to respect the shared rate budget.

use crate::archive;
use crate::config::Config;
use crate::error::{Error, Result, SourceError};
use crate::rate_gate::RateGate;
use crate::registry::TaskRegistry;
use crate::retry::fetch_with_retry;
use crate::source::MediaSource;
use crate::types::{PostRef, ResultArtifact, TaskId, TaskStatus};
use crate::utils::{sanitize_filename, title_from_caption, truncate_message};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Bound on stored error causes
const MAX_ERROR_CHARS: usize = 200;

/// Bound on per-post failure excerpts in log lines
const MAX_FAILURE_LOG_CHARS: usize = 80;

/// Progress after the account resolved
const PROGRESS_FETCHED: u8 = 10;

/// Progress when the download loop starts
const PROGRESS_SCANNED: u8 = 20;

/// Progress when packaging starts
const PROGRESS_PACKAGING: u8 = 90;

/// Width of the downloading phase's progress band
const DOWNLOAD_BAND: f64 = 70.0;

/// Drives one submitted task to a terminal state
pub(crate) struct JobRunner {
    task_id: TaskId,
    handle: String,
    task_dir: PathBuf,
    registry: Arc<TaskRegistry>,
    source: Arc<dyn MediaSource>,
    config: Arc<Config>,
    gate: RateGate,
    cancel: CancellationToken,
}

impl JobRunner {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        task_id: TaskId,
        handle: String,
        task_dir: PathBuf,
        registry: Arc<TaskRegistry>,
        source: Arc<dyn MediaSource>,
        config: Arc<Config>,
        gate: RateGate,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task_id,
            handle,
            task_dir,
            registry,
            source,
            config,
            gate,
            cancel,
        }
    }

    /// Run the task to a terminal state
    ///
    /// Never panics the spawned task: any error ends the run in the
    /// error state with a truncated cause and a final log line.
    pub(crate) async fn run(self) {
        if let Err(e) = self.execute().await {
            let cause = match &e {
                Error::Source(SourceError::AuthRequired) => {
                    "login required by the remote service; configure an authenticated \
                     session and resubmit"
                        .to_string()
                }
                other => truncate_message(&other.to_string(), MAX_ERROR_CHARS),
            };

            tracing::error!(task_id = %self.task_id, error = %e, "job failed");
            self.registry
                .update(&self.task_id, |task| {
                    task.status = TaskStatus::Error;
                    task.error = Some(cause.clone());
                })
                .await;
            self.log(format!("Error: {cause}")).await;
        }
    }

    async fn execute(&self) -> Result<()> {
        let videos_dir = self.task_dir.join("videos");
        tokio::fs::create_dir_all(&videos_dir).await?;

        let account = self.fetch_profile().await?;
        let posts = self.scan_posts(&account.handle).await?;
        let (downloaded, captions) = self.download_posts(&posts, &videos_dir).await?;
        self.package(&videos_dir, downloaded, posts.len() as u64, captions)
            .await
    }

    /// starting → fetching: resolve the account
    async fn fetch_profile(&self) -> Result<crate::types::AccountInfo> {
        self.transition(TaskStatus::Fetching, 0).await;
        self.log(format!("Fetching profile @{}...", self.handle)).await;

        let account = self
            .remote(|| self.source.resolve_account(&self.handle))
            .await?;

        if account.is_private {
            return Err(SourceError::Private(account.handle).into());
        }

        self.log(format!("{} (@{})", account.full_name, account.handle))
            .await;
        self.log(format!(
            "{} followers, {} posts",
            account.followers, account.media_count
        ))
        .await;
        self.set_progress(PROGRESS_FETCHED).await;

        Ok(account)
    }

    /// fetching → scanning: enumerate posts, keeping partial results on
    /// a mid-enumeration rate limit
    async fn scan_posts(&self, handle: &str) -> Result<Vec<PostRef>> {
        self.transition(TaskStatus::Scanning, PROGRESS_FETCHED).await;
        self.log("Scanning for video posts...".to_string()).await;

        self.gate
            .acquire(
                self.config.fetch.min_request_interval,
                self.config.fetch.gate_jitter_min,
                self.config.fetch.gate_jitter_max,
            )
            .await;

        let mut stream = self.source.list_video_posts(handle);
        let mut posts: Vec<PostRef> = Vec::new();

        loop {
            let item = tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::ShuttingDown),
                item = stream.next() => item,
            };
            match item {
                None => break,
                Some(Ok(post)) => {
                    if post.is_video {
                        posts.push(post);
                    }
                }
                Some(Err(SourceError::RateLimited)) => {
                    // Enumeration cut short is a degradation, not a failure
                    self.log(format!(
                        "Rate limited while scanning; continuing with the {} posts found so far",
                        posts.len()
                    ))
                    .await;
                    break;
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
        drop(stream);

        if posts.is_empty() {
            return Err(Error::Other(
                "no video posts found on this profile".to_string(),
            ));
        }

        self.log(format!("Found {} video posts", posts.len())).await;
        Ok(posts)
    }

    /// scanning → downloading: fetch each post serially, in enumeration
    /// order, isolating per-post failures
    async fn download_posts(
        &self,
        posts: &[PostRef],
        videos_dir: &Path,
    ) -> Result<(u64, BTreeMap<String, String>)> {
        let total = posts.len() as u64;
        self.registry
            .update(&self.task_id, |task| {
                task.status = TaskStatus::Downloading;
                task.progress = PROGRESS_SCANNED;
                task.total = total;
                task.downloaded = 0;
            })
            .await;

        let mut captions: BTreeMap<String, String> = BTreeMap::new();
        let mut downloaded: u64 = 0;

        for (index, post) in posts.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(Error::ShuttingDown);
            }
            let processed = index as u64 + 1;

            let file_name = derive_file_name(post);
            let path = videos_dir.join(&file_name);

            if path.exists() {
                self.log(format!("Skipped (already present): {file_name}"))
                    .await;
                self.set_progress(download_progress(processed, total)).await;
                continue;
            }

            self.log(format!("[{processed}/{total}] Downloading {file_name}"))
                .await;

            match self.download_post(post, &path).await {
                Ok(_) => {
                    downloaded += 1;
                    if let Some(caption) = &post.caption {
                        captions.insert(file_name.clone(), caption.clone());
                    }
                    let count = downloaded;
                    self.registry
                        .update(&self.task_id, move |task| {
                            task.downloaded = count;
                            task.progress = download_progress(processed, total);
                        })
                        .await;
                    self.log(format!("Downloaded {file_name}")).await;

                    // Per-post pacing on top of the shared gate
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(Error::ShuttingDown),
                        _ = tokio::time::sleep(self.config.fetch.post_delay) => {}
                    }
                }
                Err(Error::ShuttingDown) => return Err(Error::ShuttingDown),
                Err(Error::Source(SourceError::RateLimited)) => {
                    let _ = tokio::fs::remove_file(&path).await;
                    if downloaded > 0 {
                        // Salvage: package what was obtained rather than discard it
                        self.log(format!(
                            "Rate limited; stopping early and packaging the {downloaded} \
                             videos downloaded so far"
                        ))
                        .await;
                        break;
                    }
                    return Err(SourceError::RateLimited.into());
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&path).await;
                    self.log(format!(
                        "Failed: {}",
                        truncate_message(&e.to_string(), MAX_FAILURE_LOG_CHARS)
                    ))
                    .await;
                    self.set_progress(download_progress(processed, total)).await;
                }
            }
        }

        if downloaded == 0 {
            return Err(Error::Other(
                "no videos could be downloaded".to_string(),
            ));
        }

        Ok((downloaded, captions))
    }

    /// downloading → packaging → done
    async fn package(
        &self,
        videos_dir: &Path,
        downloaded: u64,
        total: u64,
        captions: BTreeMap<String, String>,
    ) -> Result<()> {
        self.transition(TaskStatus::Packaging, PROGRESS_PACKAGING).await;
        self.log(format!("Packaging {downloaded} videos...")).await;

        if !captions.is_empty() {
            archive::write_caption_index(videos_dir, &captions).await?;
        }

        let file_name = format!("{}_reels.zip", self.handle);
        let archive_path = self.task_dir.join(&file_name);
        let size_bytes =
            archive::pack_directory(videos_dir.to_path_buf(), archive_path.clone()).await?;

        let artifact = ResultArtifact {
            path: archive_path,
            size_bytes,
            file_name,
        };
        self.registry
            .update(&self.task_id, |task| {
                task.status = TaskStatus::Done;
                task.progress = 100;
                task.result = Some(artifact);
            })
            .await;

        let size_mib = size_bytes as f64 / (1024.0 * 1024.0);
        self.log(format!(
            "Done: {downloaded}/{total} videos ({size_mib:.1} MiB)"
        ))
        .await;
        tracing::info!(task_id = %self.task_id, downloaded, total, size_bytes, "job complete");

        Ok(())
    }

    /// Fetch one post's payload to disk through the retry executor
    async fn download_post(&self, post: &PostRef, path: &Path) -> Result<u64> {
        let mut stream = self
            .remote(|| self.source.fetch_video_bytes(post))
            .await?;

        let mut file = tokio::fs::File::create(path).await?;
        let mut written: u64 = 0;
        loop {
            let chunk = tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::ShuttingDown),
                chunk = stream.next() => chunk,
            };
            match chunk {
                None => break,
                Some(Ok(bytes)) => {
                    file.write_all(&bytes).await?;
                    written += bytes.len() as u64;
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
        file.flush().await?;

        Ok(written)
    }

    /// Run a remote call through the rate gate and retry executor,
    /// honoring cancellation during pacing and backoff sleeps
    async fn remote<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, SourceError>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::ShuttingDown),
            result = fetch_with_retry(
                &self.gate,
                &self.config.fetch,
                &self.config.retry,
                operation,
            ) => result.map_err(Error::from),
        }
    }

    async fn transition(&self, status: TaskStatus, progress: u8) {
        self.registry
            .update(&self.task_id, move |task| {
                task.status = status;
                task.progress = progress;
            })
            .await;
    }

    async fn set_progress(&self, progress: u8) {
        self.registry
            .update(&self.task_id, move |task| task.progress = progress)
            .await;
    }

    async fn log(&self, line: String) {
        tracing::debug!(task_id = %self.task_id, "{line}");
        self.registry.append_message(&self.task_id, line).await;
    }
}

/// Target filename for a post: caption-derived title, post id fallback
fn derive_file_name(post: &PostRef) -> String {
    let title = post
        .caption
        .as_deref()
        .map(title_from_caption)
        .map(|t| sanitize_filename(&t))
        .filter(|t| !t.is_empty());

    let stem = match title {
        Some(title) => title,
        None => sanitize_filename(&post.id),
    };
    format!("{stem}.mp4")
}

/// Downloading-phase progress: posts processed scaled into 20-90
fn download_progress(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return PROGRESS_SCANNED;
    }
    let fraction = processed as f64 / total as f64;
    PROGRESS_SCANNED + (fraction.clamp(0.0, 1.0) * DOWNLOAD_BAND) as u8
}
