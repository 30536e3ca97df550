//! # reel-dl
//!
//! Backend library for archiving an account's video posts: submit a
//! handle, receive a task id immediately, watch live progress over a
//! per-task push stream, and download the packaged archive.
//!
//! ## Design Philosophy
//!
//! reel-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Polite to the remote service** - One process-wide pacing gate and
//!   a classified retry policy shared by every concurrent job
//! - **Observable** - Every job appends human-readable log lines and
//!   pushes progress frames; no failure is silently swallowed
//! - **Backend-agnostic** - The fetch backend is a trait selected at
//!   configuration time; the job state machine never depends on it
//!
//! ## Quick Start
//!
//! ```no_run
//! use reel_dl::{Config, ReelDownloader};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = Arc::new(ReelDownloader::new(Config::default()).await?);
//!
//!     // Serve the REST API in the background
//!     downloader.spawn_api_server();
//!
//!     // Submit a job directly and follow its progress
//!     let submission = downloader.submit("@natgeo").await?;
//!     let mut cursor = 0;
//!     loop {
//!         if let Some(frame) = downloader.progress_frame(&submission.task_id, cursor).await {
//!             for line in &frame.messages {
//!                 println!("{line}");
//!             }
//!             cursor = frame.next_cursor;
//!             if frame.status.is_terminal() {
//!                 break;
//!             }
//!         }
//!         tokio::time::sleep(std::time::Duration::from_millis(500)).await;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Result bundle creation
pub mod archive;
/// Configuration types
pub mod config;
/// Core orchestrator
pub mod downloader;
/// Error types
pub mod error;
/// Process-wide request pacing
pub mod rate_gate;
/// Concurrent task registry
pub mod registry;
/// Retry logic with exponential backoff
pub mod retry;
/// Per-task job state machine
pub mod runner;
/// Media source backends
pub mod source;
/// Core types
pub mod types;
/// Account reference and filename helpers
pub mod utils;

// Re-export commonly used types
pub use config::{ApiConfig, Config, FetchConfig, RetryConfig, SourceConfig, StorageConfig};
pub use downloader::{ReelDownloader, Submission};
pub use error::{ApiError, Error, ErrorDetail, Result, SourceError, TaskError, ToHttpStatus};
pub use rate_gate::RateGate;
pub use registry::TaskRegistry;
pub use source::MediaSource;
pub use types::{
    AccountInfo, Capabilities, PostRef, ProgressFrame, ResultArtifact, TaskId, TaskSnapshot,
    TaskStatus,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal, then cancels all running jobs via the
/// downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use reel_dl::{Config, ReelDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = ReelDownloader::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: ReelDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown();
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("received SIGTERM signal");
            } else {
                tracing::error!("could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl+C signal");
        }
    }
}
