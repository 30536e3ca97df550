//! Media source backends
//!
//! A [`MediaSource`] enumerates an account's video posts and yields
//! playable byte streams. The job runner never depends on which
//! implementation is active; backends are selected once at construction
//! from the [`SourceConfig`](crate::config::SourceConfig).
//!
//! Two real backends ship with the crate:
//! - [`HttpApiSource`](http_api::HttpApiSource) - a paid/hosted JSON
//!   media API spoken over reqwest
//! - [`CliExtractorSource`](cli::CliExtractorSource) - an external
//!   yt-dlp-compatible extractor binary driven as a subprocess

pub mod cli;
pub mod http_api;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod testing;

use crate::config::SourceConfig;
use crate::error::{Result, SourceError};
use crate::types::{AccountInfo, PostRef};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Lazy sequence of post references
///
/// Items arrive incrementally, so a consumer interrupted by a rate limit
/// mid-enumeration keeps whatever it has already collected.
pub type PostStream<'a> = BoxStream<'a, std::result::Result<PostRef, SourceError>>;

/// Stream of video payload chunks for one post
pub type VideoByteStream = BoxStream<'static, std::result::Result<Bytes, SourceError>>;

/// Trait for media source backends
///
/// All three calls surface the classified [`SourceError`] kinds the
/// retry executor dispatches on (`RateLimited`, `AuthRequired`,
/// `NotFound`, `Private`, `Other`).
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Resolve an account handle to its profile information
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for missing accounts, `Private` for accounts
    /// whose posts are hidden, `RateLimited`/`AuthRequired`/`Other` for
    /// transport-level failures.
    async fn resolve_account(&self, handle: &str)
    -> std::result::Result<AccountInfo, SourceError>;

    /// Enumerate the account's posts as a lazy stream
    ///
    /// The stream yields posts in the source's native order. An
    /// `Err(RateLimited)` item means enumeration was cut short; items
    /// already yielded remain valid.
    fn list_video_posts(&self, handle: &str) -> PostStream<'_>;

    /// Retrieve the playable video payload for one post
    async fn fetch_video_bytes(
        &self,
        post: &PostRef,
    ) -> std::result::Result<VideoByteStream, SourceError>;

    /// Human-readable backend name for logging and capability reporting
    fn name(&self) -> &'static str;
}

/// Select a backend from the configuration
///
/// Selection order: an explicit extractor binary path wins, then a
/// configured HTTP API, then a PATH search for the extractor binary.
/// Returns `Ok(None)` when nothing is configured or discoverable; in
/// that case submissions are rejected with a server error.
pub fn select_source(config: &SourceConfig) -> Result<Option<Arc<dyn MediaSource>>> {
    if let Some(path) = &config.extractor_path {
        let source = cli::CliExtractorSource::new(path.clone());
        tracing::info!(backend = source.name(), path = %path.display(), "media source selected");
        return Ok(Some(Arc::new(source)));
    }

    if let Some(api) = &config.api {
        let source = http_api::HttpApiSource::new(api.clone())?;
        tracing::info!(backend = source.name(), base_url = %api.base_url, "media source selected");
        return Ok(Some(Arc::new(source)));
    }

    if config.search_path {
        if let Some(source) = cli::CliExtractorSource::from_path() {
            tracing::info!(backend = source.name(), "media source discovered on PATH");
            return Ok(Some(Arc::new(source)));
        }
    }

    tracing::warn!("no media source backend configured; submissions will be rejected");
    Ok(None)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpApiConfig;

    #[test]
    fn explicit_extractor_path_wins_over_api_config() {
        let config = SourceConfig {
            api: Some(HttpApiConfig {
                base_url: "http://localhost:9999".to_string(),
                api_key: None,
            }),
            extractor_path: Some(std::path::PathBuf::from("/usr/bin/yt-dlp")),
            search_path: false,
        };
        let source = select_source(&config).unwrap().unwrap();
        assert_eq!(source.name(), "cli-extractor");
    }

    #[test]
    fn api_config_selects_http_backend() {
        let config = SourceConfig {
            api: Some(HttpApiConfig {
                base_url: "http://localhost:9999".to_string(),
                api_key: None,
            }),
            extractor_path: None,
            search_path: false,
        };
        let source = select_source(&config).unwrap().unwrap();
        assert_eq!(source.name(), "http-api");
    }

    #[test]
    fn nothing_configured_and_no_search_yields_none() {
        let config = SourceConfig {
            api: None,
            extractor_path: None,
            search_path: false,
        };
        assert!(select_source(&config).unwrap().is_none());
    }
}
