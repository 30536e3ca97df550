//! Concurrent task registry
//!
//! The registry is the only structure mutated by more than one unit of
//! concurrency: the owning job runner writes, API observers read. All
//! access goes through one mutex with short critical sections that are
//! never held across blocking calls; callers receive copied snapshots,
//! never references into a live task.

use crate::types::{ProgressFrame, ResultArtifact, TaskId, TaskSnapshot, TaskStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// The state and history of one job
///
/// A task is created when a submission is accepted, mutated only by its
/// own job runner through [`TaskRegistry::update`], and destroyed
/// together with its on-disk directory when its age exceeds the TTL.
#[derive(Clone, Debug)]
pub(crate) struct Task {
    /// Immutable short identifier
    pub(crate) id: TaskId,
    /// Normalized account handle
    pub(crate) handle: String,
    /// Current lifecycle status
    pub(crate) status: TaskStatus,
    /// Progress percentage, 0-100
    pub(crate) progress: u8,
    /// Append-only human-readable log lines
    pub(crate) messages: Vec<String>,
    /// Number of eligible posts (known after scanning)
    pub(crate) total: u64,
    /// Number of downloaded posts
    pub(crate) downloaded: u64,
    /// Error cause, set only in the error state
    pub(crate) error: Option<String>,
    /// Packaged result, set only in the done state
    pub(crate) result: Option<ResultArtifact>,
    /// Creation time, used solely for TTL eviction
    pub(crate) created_at: DateTime<Utc>,
    /// Private on-disk work directory
    pub(crate) dir: PathBuf,
}

struct TaskEntry {
    task: Task,
    notify: Arc<Notify>,
}

/// Concurrent key-value store of live tasks
///
/// Each entry carries a [`Notify`] handle so progress streams wake
/// immediately on updates instead of polling at a fixed interval.
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, TaskEntry>>,
}

impl TaskRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a fresh task in the starting state
    pub(crate) async fn create(&self, id: TaskId, handle: &str, dir: PathBuf) {
        let task = Task {
            id: id.clone(),
            handle: handle.to_string(),
            status: TaskStatus::Starting,
            progress: 0,
            messages: Vec::new(),
            total: 0,
            downloaded: 0,
            error: None,
            result: None,
            created_at: Utc::now(),
            dir,
        };

        let mut tasks = self.tasks.lock().await;
        tasks.insert(
            id.clone(),
            TaskEntry {
                task,
                notify: Arc::new(Notify::new()),
            },
        );
        tracing::info!(task_id = %id, handle = %handle, "task created");
    }

    /// Apply a mutation to a task and wake its observers
    ///
    /// The registry enforces the lifecycle invariants regardless of what
    /// the closure wrote: progress never decreases, status never moves
    /// backwards, and a terminal task is frozen entirely.
    ///
    /// Returns false if the task does not exist.
    pub(crate) async fn update<F>(&self, id: &TaskId, mutate: F) -> bool
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.tasks.lock().await;
        let Some(entry) = tasks.get_mut(id) else {
            return false;
        };

        let before = entry.task.clone();
        mutate(&mut entry.task);

        if before.status.is_terminal() {
            // Terminal tasks are immutable history
            entry.task = before;
            return true;
        }
        if entry.task.status.rank() < before.status.rank() {
            entry.task.status = before.status;
        }
        if entry.task.progress < before.progress {
            entry.task.progress = before.progress;
        }

        entry.notify.notify_waiters();
        true
    }

    /// Append one log line to a task and wake its observers
    pub(crate) async fn append_message(&self, id: &TaskId, line: String) {
        let mut tasks = self.tasks.lock().await;
        if let Some(entry) = tasks.get_mut(id) {
            entry.task.messages.push(line);
            entry.notify.notify_waiters();
        }
    }

    /// Consistent copy of a task's externally visible state
    pub async fn snapshot(&self, id: &TaskId) -> Option<TaskSnapshot> {
        let tasks = self.tasks.lock().await;
        tasks.get(id).map(|entry| snapshot_of(&entry.task))
    }

    /// Snapshots of all live tasks, newest first
    pub async fn snapshots(&self) -> Vec<TaskSnapshot> {
        let tasks = self.tasks.lock().await;
        let mut all: Vec<TaskSnapshot> = tasks.values().map(|e| snapshot_of(&e.task)).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// One progress frame: current state plus the log lines at or after
    /// `cursor`, and the cursor for the next frame
    ///
    /// Successive frames with monotonically advancing cursors never
    /// repeat or reorder a line.
    pub async fn frame(&self, id: &TaskId, cursor: usize) -> Option<ProgressFrame> {
        let tasks = self.tasks.lock().await;
        let entry = tasks.get(id)?;
        let task = &entry.task;

        let from = cursor.min(task.messages.len());
        let messages = task.messages[from..].to_vec();

        Some(ProgressFrame {
            status: task.status,
            progress: task.progress,
            messages,
            total: task.total,
            downloaded: task.downloaded,
            error: task.error.clone(),
            result_name: task.result.as_ref().map(|r| r.file_name.clone()),
            result_size_bytes: task.result.as_ref().map(|r| r.size_bytes),
            next_cursor: task.messages.len(),
        })
    }

    /// The task's wakeup handle for progress streams
    pub async fn notifier(&self, id: &TaskId) -> Option<Arc<Notify>> {
        let tasks = self.tasks.lock().await;
        tasks.get(id).map(|entry| entry.notify.clone())
    }

    /// Remove tasks older than `ttl` and return their directories
    ///
    /// Directory deletion is the caller's job, outside the registry
    /// lock. Waiters of evicted tasks are woken so attached progress
    /// streams observe the disappearance promptly.
    pub(crate) async fn sweep_expired(&self, ttl: Duration) -> Vec<(TaskId, PathBuf)> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();

        let mut tasks = self.tasks.lock().await;
        let expired: Vec<TaskId> = tasks
            .iter()
            .filter(|(_, entry)| now - entry.task.created_at > ttl)
            .map(|(id, _)| id.clone())
            .collect();

        let mut doomed = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(entry) = tasks.remove(&id) {
                entry.notify.notify_waiters();
                tracing::info!(task_id = %id, "task expired, evicting");
                doomed.push((id, entry.task.dir));
            }
        }
        doomed
    }

    /// Number of live tasks
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether the registry holds no tasks
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot_of(task: &Task) -> TaskSnapshot {
    TaskSnapshot {
        id: task.id.clone(),
        handle: task.handle.clone(),
        status: task.status,
        progress: task.progress,
        total: task.total,
        downloaded: task.downloaded,
        error: task.error.clone(),
        result: task.result.clone(),
        created_at: task.created_at,
    }
}
