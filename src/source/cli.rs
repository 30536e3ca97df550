//! CLI extractor backend using an external yt-dlp-compatible binary
//!
//! Enumeration runs `--dump-json --flat-playlist` and parses one JSON
//! object per stdout line; payload fetches run `-o -` and stream stdout.
//! Failures are classified by scanning stderr for the remote service's
//! characteristic phrases, the same way the wrapped tools report them.

use super::{MediaSource, PostStream, VideoByteStream};
use crate::error::SourceError;
use crate::types::{AccountInfo, PostRef};
use crate::utils::truncate_message;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::wrappers::LinesStream;
use tokio_util::io::ReaderStream;

/// Default extractor binary searched on PATH
const EXTRACTOR_BINARY: &str = "yt-dlp";

/// Bound on stderr excerpts carried into error messages
const STDERR_EXCERPT_CHARS: usize = 200;

/// CLI extractor backend
///
/// # Examples
///
/// ```no_run
/// use reel_dl::source::cli::CliExtractorSource;
/// use std::path::PathBuf;
///
/// // Create with an explicit path
/// let source = CliExtractorSource::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let source = CliExtractorSource::from_path();
/// ```
pub struct CliExtractorSource {
    binary_path: PathBuf,
}

impl CliExtractorSource {
    /// Create a backend with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find the extractor binary in PATH
    ///
    /// Uses the `which` crate to search for `yt-dlp` in the system PATH.
    /// Returns `Some` if the binary is found, `None` otherwise.
    pub fn from_path() -> Option<Self> {
        which::which(EXTRACTOR_BINARY).ok().map(Self::new)
    }

    fn profile_url(handle: &str) -> String {
        format!(
            "https://www.instagram.com/{}/reels/",
            urlencoding::encode(handle)
        )
    }
}

#[async_trait]
impl MediaSource for CliExtractorSource {
    async fn resolve_account(&self, handle: &str) -> Result<AccountInfo, SourceError> {
        let url = Self::profile_url(handle);
        let output = Command::new(&self.binary_path)
            .args([
                "--dump-single-json",
                "--flat-playlist",
                "--playlist-items",
                "0",
                url.as_str(),
            ])
            .output()
            .await
            .map_err(|e| SourceError::Other(format!("failed to execute extractor: {e}")))?;

        if !output.status.success() {
            return Err(classify_stderr(&output.stderr, handle));
        }

        let value: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| SourceError::Other(format!("malformed extractor output: {e}")))?;

        Ok(AccountInfo {
            handle: handle.to_string(),
            full_name: value
                .get("uploader")
                .or_else(|| value.get("channel"))
                .and_then(|v| v.as_str())
                .unwrap_or(handle)
                .to_string(),
            followers: value
                .get("channel_follower_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            media_count: value
                .get("playlist_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            is_private: false,
        })
    }

    fn list_video_posts(&self, handle: &str) -> PostStream<'_> {
        let url = Self::profile_url(handle);
        let spawned = Command::new(&self.binary_path)
            .args(["--dump-json", "--flat-playlist", url.as_str()])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                return futures::stream::once(async move {
                    Err(SourceError::Other(format!(
                        "failed to spawn extractor: {e}"
                    )))
                })
                .boxed();
            }
        };

        let Some(stdout) = child.stdout.take() else {
            return futures::stream::once(async {
                Err(SourceError::Other(
                    "extractor stdout was not captured".to_string(),
                ))
            })
            .boxed();
        };

        let lines = LinesStream::new(BufReader::new(stdout).lines());
        lines
            .filter_map(move |line| {
                // Holding the child in the closure keeps the process
                // alive for the lifetime of the stream.
                let _child = &child;
                let item = match line {
                    Ok(line) if line.trim().is_empty() => None,
                    Ok(line) => match parse_post_line(&line) {
                        Ok(post) => Some(Ok(post)),
                        Err(e) => {
                            tracing::warn!(error = %e, "skipping unparsable extractor line");
                            None
                        }
                    },
                    Err(e) => Some(Err(SourceError::Other(format!(
                        "extractor output read failed: {e}"
                    )))),
                };
                futures::future::ready(item)
            })
            .boxed()
    }

    async fn fetch_video_bytes(&self, post: &PostRef) -> Result<VideoByteStream, SourceError> {
        let mut child = Command::new(&self.binary_path)
            .args(["--quiet", "-o", "-", post.url.as_str()])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SourceError::Other(format!("failed to spawn extractor: {e}")))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            SourceError::Other("extractor stdout was not captured".to_string())
        })?;

        let stream = ReaderStream::new(stdout).map(move |chunk| {
            let _child = &child;
            chunk.map_err(|e| SourceError::Other(format!("video byte stream failed: {e}")))
        });
        Ok(stream.boxed())
    }

    fn name(&self) -> &'static str {
        "cli-extractor"
    }
}

/// Parse one `--dump-json` line into a post reference
fn parse_post_line(line: &str) -> Result<PostRef, SourceError> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| SourceError::Other(format!("malformed post entry: {e}")))?;

    let id = value
        .get("id")
        .or_else(|| value.get("display_id"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| SourceError::Other("post entry without id".to_string()))?
        .to_string();

    let url = value
        .get("url")
        .or_else(|| value.get("webpage_url"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| SourceError::Other(format!("post {id} without URL")))?
        .to_string();

    let caption = value
        .get("description")
        .or_else(|| value.get("title"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    // Flat-playlist entries omit codec info; only an explicit
    // `vcodec: none` marks a non-video entry.
    let is_video = value
        .get("vcodec")
        .and_then(|v| v.as_str())
        .map(|v| v != "none")
        .unwrap_or(true);

    Ok(PostRef {
        id,
        url,
        caption,
        is_video,
        video_url: None,
    })
}

/// Classify extractor stderr into the shared error taxonomy
fn classify_stderr(stderr: &[u8], handle: &str) -> SourceError {
    let text = String::from_utf8_lossy(stderr);
    let lowered = text.to_lowercase();

    if lowered.contains("429")
        || lowered.contains("rate limit")
        || lowered.contains("too many requests")
    {
        SourceError::RateLimited
    } else if lowered.contains("login required")
        || lowered.contains("authentication")
        || lowered.contains("cookies")
    {
        SourceError::AuthRequired
    } else if lowered.contains("private") {
        SourceError::Private(handle.to_string())
    } else if lowered.contains("does not exist")
        || lowered.contains("not found")
        || lowered.contains("404")
    {
        SourceError::NotFound(handle.to_string())
    } else {
        SourceError::Other(truncate_message(text.trim(), STDERR_EXCERPT_CHARS))
    }
}
