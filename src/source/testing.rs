//! Deterministic in-memory media source for tests

use super::{MediaSource, PostStream, VideoByteStream};
use crate::error::SourceError;
use crate::types::{AccountInfo, PostRef};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;

/// Scripted media source: every call replays a pre-configured outcome.
///
/// Post payloads default to `b"video:<id>"` unless overridden; payload
/// overrides keyed by post id can also inject per-post failures.
pub(crate) struct ScriptedSource {
    account: Result<AccountInfo, SourceError>,
    posts: Vec<Result<PostRef, SourceError>>,
    payload_overrides: HashMap<String, Result<Vec<u8>, SourceError>>,
}

impl ScriptedSource {
    pub(crate) fn new(account: Result<AccountInfo, SourceError>) -> Self {
        Self {
            account,
            posts: Vec::new(),
            payload_overrides: HashMap::new(),
        }
    }

    /// Public, non-private account with the given handle
    pub(crate) fn with_public_account(handle: &str) -> Self {
        Self::new(Ok(AccountInfo {
            handle: handle.to_string(),
            full_name: format!("The {handle} account"),
            followers: 1_000,
            media_count: 50,
            is_private: false,
        }))
    }

    pub(crate) fn push_post(mut self, id: &str, caption: Option<&str>) -> Self {
        self.posts.push(Ok(PostRef {
            id: id.to_string(),
            url: format!("https://example.test/reel/{id}/"),
            caption: caption.map(str::to_string),
            is_video: true,
            video_url: None,
        }));
        self
    }

    pub(crate) fn push_non_video_post(mut self, id: &str) -> Self {
        self.posts.push(Ok(PostRef {
            id: id.to_string(),
            url: format!("https://example.test/p/{id}/"),
            caption: None,
            is_video: false,
            video_url: None,
        }));
        self
    }

    pub(crate) fn push_enumeration_error(mut self, error: SourceError) -> Self {
        self.posts.push(Err(error));
        self
    }

    pub(crate) fn with_payload_error(mut self, id: &str, error: SourceError) -> Self {
        self.payload_overrides.insert(id.to_string(), Err(error));
        self
    }

    pub(crate) fn with_payload(mut self, id: &str, bytes: &[u8]) -> Self {
        self.payload_overrides.insert(id.to_string(), Ok(bytes.to_vec()));
        self
    }

    pub(crate) fn default_payload(id: &str) -> Vec<u8> {
        format!("video:{id}").into_bytes()
    }
}

#[async_trait]
impl MediaSource for ScriptedSource {
    async fn resolve_account(&self, _handle: &str) -> Result<AccountInfo, SourceError> {
        self.account.clone()
    }

    fn list_video_posts(&self, _handle: &str) -> PostStream<'_> {
        futures::stream::iter(self.posts.clone()).boxed()
    }

    async fn fetch_video_bytes(&self, post: &PostRef) -> Result<VideoByteStream, SourceError> {
        let payload = match self.payload_overrides.get(&post.id) {
            Some(Ok(bytes)) => bytes.clone(),
            Some(Err(error)) => return Err(error.clone()),
            None => Self::default_payload(&post.id),
        };
        Ok(futures::stream::once(async move { Ok(Bytes::from(payload)) }).boxed())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
