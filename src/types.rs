//! Core types for reel-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Unique identifier for a task
///
/// Short opaque id (8 lowercase hex characters), immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a fresh random task id
    pub fn generate() -> Self {
        let full = uuid::Uuid::new_v4().simple().to_string();
        Self(full[..8].to_string())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task status
///
/// Statuses advance strictly forward through
/// `starting → fetching → scanning → downloading → packaging → done`,
/// except that `error` is reachable from any non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Accepted, runner not yet started remote work
    Starting,
    /// Resolving the account profile
    Fetching,
    /// Enumerating video posts
    Scanning,
    /// Downloading video payloads
    Downloading,
    /// Building the result bundle
    Packaging,
    /// Finished successfully, result available
    Done,
    /// Finished with an error
    Error,
}

impl TaskStatus {
    /// Position in the forward progression, used to refuse regressions.
    ///
    /// `Done` and `Error` share the final rank; terminal states are
    /// additionally frozen by [`is_terminal`](Self::is_terminal).
    pub fn rank(&self) -> u8 {
        match self {
            TaskStatus::Starting => 0,
            TaskStatus::Fetching => 1,
            TaskStatus::Scanning => 2,
            TaskStatus::Downloading => 3,
            TaskStatus::Packaging => 4,
            TaskStatus::Done | TaskStatus::Error => 5,
        }
    }

    /// Whether this status ends the task lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Starting => "starting",
            TaskStatus::Fetching => "fetching",
            TaskStatus::Scanning => "scanning",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Packaging => "packaging",
            TaskStatus::Done => "done",
            TaskStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Resolved profile information for an account
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Normalized handle
    pub handle: String,
    /// Display name
    pub full_name: String,
    /// Follower count
    pub followers: u64,
    /// Total post count (all media types)
    pub media_count: u64,
    /// Whether the account's posts are hidden from anonymous sessions
    pub is_private: bool,
}

/// Reference to a single post, carrying enough information to fetch its
/// video payload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostRef {
    /// Stable post identifier (shortcode)
    pub id: String,
    /// Canonical post URL
    pub url: String,
    /// Caption text, if the post has one
    pub caption: Option<String>,
    /// Whether the post carries a video payload
    pub is_video: bool,
    /// Direct video payload URL, when the backend resolves one upfront
    pub video_url: Option<String>,
}

/// Location and metadata of a packaged result bundle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ResultArtifact {
    /// Absolute path of the archive on disk
    pub path: PathBuf,
    /// Archive size in bytes
    pub size_bytes: u64,
    /// Logical download filename (e.g. "natgeo_reels.zip")
    pub file_name: String,
}

/// Consistent copy of a task's externally visible state
///
/// Snapshots are taken under the registry lock; callers never see a
/// reference into the live task.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskSnapshot {
    /// Task identifier
    pub id: TaskId,
    /// Normalized account handle this task is archiving
    pub handle: String,
    /// Current status
    pub status: TaskStatus,
    /// Progress percentage (0-100, non-decreasing within a run)
    pub progress: u8,
    /// Number of eligible posts discovered (0 until scanning completes)
    pub total: u64,
    /// Number of posts downloaded so far
    pub downloaded: u64,
    /// Error cause, present only in the error state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Result bundle, present only in the done state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultArtifact>,
    /// When the task was created (used solely for TTL eviction)
    pub created_at: DateTime<Utc>,
}

/// One frame of a task's progress stream
///
/// `messages` contains only the log lines appended since the previous
/// frame; a subscriber never sees a line twice.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProgressFrame {
    /// Current status
    pub status: TaskStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Log lines appended since the last frame
    pub messages: Vec<String>,
    /// Number of eligible posts discovered
    pub total: u64,
    /// Number of posts downloaded so far
    pub downloaded: u64,
    /// Error cause, present once the task is in the error state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Result archive filename, present once the task is done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_name: Option<String>,
    /// Result archive size in bytes, present once the task is done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_size_bytes: Option<u64>,
    /// Cursor for the next frame (internal, not serialized)
    #[serde(skip)]
    pub next_cursor: usize,
}

/// Overall system capabilities
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Capabilities {
    /// Media source backend availability
    pub source: SourceCapabilities,
}

/// Information about the active media source backend
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SourceCapabilities {
    /// Whether a backend is configured; submissions fail without one
    pub configured: bool,
    /// Name of the backend implementation in use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}
