//! HTTP media API backend
//!
//! Speaks a hosted JSON media API:
//! - `GET {base}/accounts/{handle}` - profile resolution
//! - `GET {base}/accounts/{handle}/posts?cursor=...` - paginated post
//!   enumeration
//! - `GET {video_url}` - raw video payload
//!
//! HTTP statuses are classified into the shared error taxonomy:
//! 401 is an authentication demand, 403 a private account, 404 a missing
//! account, 429 a rate limit; everything else non-2xx is unclassified.

use super::{MediaSource, PostStream, VideoByteStream};
use crate::config::HttpApiConfig;
use crate::error::SourceError;
use crate::types::{AccountInfo, PostRef};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use std::time::Duration;

/// Timeout for profile and enumeration calls
///
/// Video payload requests are deliberately not bounded this way; large
/// downloads legitimately run for minutes.
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection establishment timeout for all requests
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP media API backend
#[derive(Clone)]
pub struct HttpApiSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

/// Profile payload as the API serves it
#[derive(Debug, Deserialize)]
struct WireAccount {
    handle: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    followers: u64,
    #[serde(default)]
    media_count: u64,
    #[serde(default)]
    is_private: bool,
}

/// One post as the API serves it
#[derive(Debug, Deserialize)]
struct WirePost {
    id: String,
    url: String,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    is_video: bool,
    #[serde(default)]
    video_url: Option<String>,
}

/// One page of the post listing
#[derive(Debug, Deserialize)]
struct WirePostPage {
    posts: Vec<WirePost>,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl From<WirePost> for PostRef {
    fn from(wire: WirePost) -> Self {
        PostRef {
            id: wire.id,
            url: wire.url,
            caption: wire.caption,
            is_video: wire.is_video,
            video_url: wire.video_url,
        }
    }
}

/// Pagination state for the lazy post stream
enum PageState {
    Start,
    Next(String),
    Finished,
}

impl HttpApiSource {
    /// Create a backend for the given API configuration
    pub fn new(config: HttpApiConfig) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
    }

    async fn fetch_page(
        &self,
        handle: &str,
        cursor: Option<&str>,
    ) -> Result<WirePostPage, SourceError> {
        let url = format!(
            "{}/accounts/{}/posts",
            self.base_url,
            urlencoding::encode(handle)
        );
        let mut request = self.get(&url).timeout(METADATA_TIMEOUT);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Other(format!("post listing request failed: {e}")))?;
        classify_status(response.status().as_u16(), handle)?;

        response
            .json()
            .await
            .map_err(|e| SourceError::Other(format!("malformed post listing: {e}")))
    }
}

#[async_trait]
impl MediaSource for HttpApiSource {
    async fn resolve_account(&self, handle: &str) -> Result<AccountInfo, SourceError> {
        let url = format!("{}/accounts/{}", self.base_url, urlencoding::encode(handle));
        let response = self
            .get(&url)
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .map_err(|e| SourceError::Other(format!("profile request failed: {e}")))?;
        classify_status(response.status().as_u16(), handle)?;

        let wire: WireAccount = response
            .json()
            .await
            .map_err(|e| SourceError::Other(format!("malformed profile payload: {e}")))?;

        Ok(AccountInfo {
            handle: wire.handle,
            full_name: wire.full_name,
            followers: wire.followers,
            media_count: wire.media_count,
            is_private: wire.is_private,
        })
    }

    fn list_video_posts(&self, handle: &str) -> PostStream<'_> {
        let handle = handle.to_string();
        let pages = futures::stream::try_unfold(PageState::Start, move |state| {
            let handle = handle.clone();
            async move {
                let cursor = match state {
                    PageState::Start => None,
                    PageState::Next(cursor) => Some(cursor),
                    PageState::Finished => return Ok(None),
                };
                let page = self.fetch_page(&handle, cursor.as_deref()).await?;
                let next = match page.next_cursor {
                    Some(cursor) => PageState::Next(cursor),
                    None => PageState::Finished,
                };
                let posts = futures::stream::iter(
                    page.posts
                        .into_iter()
                        .map(|p| Ok::<PostRef, SourceError>(p.into())),
                );
                Ok(Some((posts, next)))
            }
        });

        pages.try_flatten().boxed()
    }

    async fn fetch_video_bytes(&self, post: &PostRef) -> Result<VideoByteStream, SourceError> {
        let video_url = post.video_url.clone().ok_or_else(|| {
            SourceError::Other(format!("post {} carries no video URL", post.id))
        })?;

        let response = self
            .get(&video_url)
            .send()
            .await
            .map_err(|e| SourceError::Other(format!("video request failed: {e}")))?;
        classify_status(response.status().as_u16(), &post.id)?;

        let stream = response
            .bytes_stream()
            .map_err(|e| SourceError::Other(format!("video byte stream failed: {e}")));
        Ok(stream.boxed())
    }

    fn name(&self) -> &'static str {
        "http-api"
    }
}

/// Map an HTTP status to the classified error taxonomy
///
/// `subject` names the account (or post) in the resulting error.
fn classify_status(status: u16, subject: &str) -> Result<(), SourceError> {
    match status {
        200..=299 => Ok(()),
        401 => Err(SourceError::AuthRequired),
        403 => Err(SourceError::Private(subject.to_string())),
        404 => Err(SourceError::NotFound(subject.to_string())),
        429 => Err(SourceError::RateLimited),
        other => Err(SourceError::Other(format!(
            "unexpected HTTP status {other}"
        ))),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn source_for(server: &MockServer) -> HttpApiSource {
        HttpApiSource::new(HttpApiConfig {
            base_url: server.uri(),
            api_key: None,
        })
        .unwrap()
    }

    #[test]
    fn classify_status_covers_the_taxonomy() {
        assert!(classify_status(200, "x").is_ok());
        assert!(matches!(
            classify_status(401, "x"),
            Err(SourceError::AuthRequired)
        ));
        assert!(matches!(
            classify_status(403, "x"),
            Err(SourceError::Private(_))
        ));
        assert!(matches!(
            classify_status(404, "x"),
            Err(SourceError::NotFound(_))
        ));
        assert!(matches!(
            classify_status(429, "x"),
            Err(SourceError::RateLimited)
        ));
        assert!(matches!(
            classify_status(500, "x"),
            Err(SourceError::Other(_))
        ));
    }

    #[tokio::test]
    async fn resolve_account_maps_profile_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/natgeo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "handle": "natgeo",
                "full_name": "National Geographic",
                "followers": 280_000_000u64,
                "media_count": 30_000u64,
                "is_private": false
            })))
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        let account = source.resolve_account("natgeo").await.unwrap();
        assert_eq!(account.handle, "natgeo");
        assert_eq!(account.full_name, "National Geographic");
        assert_eq!(account.followers, 280_000_000);
        assert!(!account.is_private);
    }

    #[tokio::test]
    async fn resolve_account_classifies_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/throttled"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/walled"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/hidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        assert!(matches!(
            source.resolve_account("missing").await,
            Err(SourceError::NotFound(h)) if h == "missing"
        ));
        assert!(matches!(
            source.resolve_account("throttled").await,
            Err(SourceError::RateLimited)
        ));
        assert!(matches!(
            source.resolve_account("walled").await,
            Err(SourceError::AuthRequired)
        ));
        assert!(matches!(
            source.resolve_account("hidden").await,
            Err(SourceError::Private(h)) if h == "hidden"
        ));
    }

    #[tokio::test]
    async fn post_listing_follows_pagination_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/natgeo/posts"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "posts": [
                    {"id": "c", "url": "https://x/c", "is_video": true}
                ],
                "next_cursor": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/natgeo/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "posts": [
                    {"id": "a", "url": "https://x/a", "is_video": true, "caption": "First"},
                    {"id": "b", "url": "https://x/b", "is_video": false}
                ],
                "next_cursor": "page2"
            })))
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        let posts: Vec<_> = source
            .list_video_posts("natgeo")
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"], "enumeration order must be preserved");
        assert_eq!(posts[0].caption.as_deref(), Some("First"));
        assert!(!posts[1].is_video);
    }

    #[tokio::test]
    async fn rate_limited_mid_enumeration_yields_partial_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/natgeo/posts"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/natgeo/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "posts": [{"id": "a", "url": "https://x/a", "is_video": true}],
                "next_cursor": "page2"
            })))
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        let items: Vec<_> = source.list_video_posts("natgeo").collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().id, "a");
        assert!(matches!(items[1], Err(SourceError::RateLimited)));
    }

    #[tokio::test]
    async fn fetch_video_bytes_streams_the_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video/a.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake video bytes".to_vec()))
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        let post = PostRef {
            id: "a".to_string(),
            url: "https://x/a".to_string(),
            caption: None,
            is_video: true,
            video_url: Some(format!("{}/video/a.mp4", server.uri())),
        };

        let stream = source.fetch_video_bytes(&post).await.unwrap();
        let chunks: Vec<_> = stream.try_collect::<Vec<_>>().await.unwrap();
        let body: Vec<u8> = chunks.into_iter().flatten().collect();
        assert_eq!(body, b"fake video bytes");
    }

    #[tokio::test]
    async fn fetch_video_bytes_without_url_is_an_error() {
        let server = MockServer::start().await;
        let source = source_for(&server).await;
        let post = PostRef {
            id: "a".to_string(),
            url: "https://x/a".to_string(),
            caption: None,
            is_video: true,
            video_url: None,
        };
        assert!(matches!(
            source.fetch_video_bytes(&post).await,
            Err(SourceError::Other(_))
        ));
    }
}
