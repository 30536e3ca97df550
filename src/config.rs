//! Configuration types for reel-dl

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use utoipa::ToSchema;

/// Storage configuration (task directories and eviction)
///
/// Groups settings related to where task artifacts live on disk and how
/// long finished tasks survive. Used as a nested sub-config within
/// [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Root directory for per-task work directories (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Time-to-live for a task and its on-disk artifacts (default: 1800 s)
    ///
    /// Expired tasks are swept opportunistically on each new submission;
    /// the registry entry and the task directory are removed together.
    #[serde(default = "default_task_ttl", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub task_ttl: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            task_ttl: default_task_ttl(),
        }
    }
}

/// Remote-call pacing configuration
///
/// All outbound calls to the media source share one pacing gate; these
/// settings control the minimum interval between any two calls and the
/// extra delay between consecutive post downloads within one task.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FetchConfig {
    /// Minimum interval between any two outbound remote calls (default: 2 s)
    #[serde(default = "default_min_request_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub min_request_interval: Duration,

    /// Lower bound of the random pacing jitter (default: 1 s)
    ///
    /// A uniform random offset in `gate_jitter_min..=gate_jitter_max` is
    /// added to every pacing wait to avoid a detectable request cadence.
    #[serde(default = "default_gate_jitter_min", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub gate_jitter_min: Duration,

    /// Upper bound of the random pacing jitter (default: 3 s)
    #[serde(default = "default_gate_jitter_max", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub gate_jitter_max: Duration,

    /// Extra delay after each successful post download (default: 2 s)
    #[serde(default = "default_post_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub post_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            min_request_interval: default_min_request_interval(),
            gate_jitter_min: default_gate_jitter_min(),
            gate_jitter_max: default_gate_jitter_max(),
            post_delay: default_post_delay(),
        }
    }
}

/// Retry configuration for rate-limited remote calls
///
/// The backoff for attempt `n` (0-based) is
/// `base_delay * backoff_multiplier^n` plus a uniform random jitter in
/// `jitter_min..=jitter_max`. With the defaults the sleeps land at
/// roughly 30 s, 90 s and 270 s.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial call (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay before the first retry (default: 30 s)
    #[serde(default = "default_base_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub base_delay: Duration,

    /// Multiplier for exponential backoff (default: 3.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Lower bound of the additive backoff jitter (default: 5 s)
    #[serde(default = "default_retry_jitter_min", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub jitter_min: Duration,

    /// Upper bound of the additive backoff jitter (default: 15 s)
    #[serde(default = "default_retry_jitter_max", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub jitter_max: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_min: default_retry_jitter_min(),
            jitter_max: default_retry_jitter_max(),
        }
    }
}

/// HTTP media API backend configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HttpApiConfig {
    /// Base URL of the media API (e.g. "https://api.example.com/v1")
    pub base_url: String,

    /// API key sent as a bearer token, if the provider requires one
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Media source backend selection
///
/// Backends are tried in order: an explicit extractor binary path wins,
/// then a configured HTTP API, then a PATH search for a known extractor
/// binary. With none available, submissions are rejected.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SourceConfig {
    /// HTTP media API backend
    #[serde(default)]
    pub api: Option<HttpApiConfig>,

    /// Path to a yt-dlp-compatible extractor binary
    #[serde(default)]
    pub extractor_path: Option<PathBuf>,

    /// Whether to search PATH for an extractor binary if no explicit
    /// backend is configured (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6789)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Optional API key for authentication
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for ReelDownloader
///
/// Fields are organized into logical sub-configs:
/// - [`storage`](StorageConfig) — task directories and TTL eviction
/// - [`fetch`](FetchConfig) — outbound request pacing
/// - [`retry`](RetryConfig) — rate-limit backoff policy
/// - [`source`](SourceConfig) — media source backend selection
/// - [`api`](ApiConfig) — REST API server settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Task storage and eviction settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Outbound request pacing settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Rate-limit retry/backoff settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Media source backend selection
    #[serde(default)]
    pub source: SourceConfig,

    /// REST API server settings
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_task_ttl() -> Duration {
    Duration::from_secs(1800)
}

fn default_min_request_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_gate_jitter_min() -> Duration {
    Duration::from_secs(1)
}

fn default_gate_jitter_max() -> Duration {
    Duration::from_secs(3)
}

fn default_post_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    3.0
}

fn default_retry_jitter_min() -> Duration {
    Duration::from_secs(5)
}

fn default_retry_jitter_max() -> Duration {
    Duration::from_secs(15)
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6789))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
