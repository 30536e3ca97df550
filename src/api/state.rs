//! Application state for the API server

use crate::{Config, ReelDownloader};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the downloader instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The main ReelDownloader instance
    pub downloader: Arc<ReelDownloader>,

    /// Configuration (for read access)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<ReelDownloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}
