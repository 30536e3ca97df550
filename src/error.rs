//! Error types for reel-dl
//!
//! This module provides the error handling for the library, including:
//! - The classified remote-failure taxonomy (`SourceError`) consumed by
//!   the retry executor
//! - Task lookup and readiness errors (`TaskError`)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for reel-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classified failure raised by a media source backend
///
/// Every remote call a backend makes must surface one of these kinds.
/// The retry executor dispatches on them: only `RateLimited` is
/// transient; `AuthRequired` is terminal for the current session and
/// surfaced immediately because retrying cannot help; the rest are
/// permanent.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The remote service throttled the request (HTTP 429 or equivalent)
    #[error("rate limited by the remote service")]
    RateLimited,

    /// The remote service demands a logged-in session
    #[error("login required by the remote service")]
    AuthRequired,

    /// The account does not exist
    #[error("account @{0} does not exist")]
    NotFound(String),

    /// The account exists but its posts are not publicly visible
    #[error("account @{0} is private")]
    Private(String),

    /// Any other backend failure
    #[error("{0}")]
    Other(String),
}

/// Task lookup and readiness errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// No live task with this identifier (never existed, or TTL-evicted)
    #[error("task {id} not found")]
    NotFound {
        /// The task identifier that was not found
        id: String,
    },

    /// The task exists but has not reached the done state
    #[error("task {id} is not finished (status: {status})")]
    NotReady {
        /// The task identifier
        id: String,
        /// The task's current status
        status: String,
    },

    /// The task finished but its archive is gone from disk
    #[error("result for task {id} no longer exists on disk")]
    ResultMissing {
        /// The task identifier
        id: String,
    },
}

/// Main error type for reel-dl
#[derive(Debug, Error)]
pub enum Error {
    /// The submitted account reference could not be normalized to a handle
    #[error("invalid account reference: {0}")]
    InvalidAccountRef(String),

    /// No media source backend is configured or discoverable
    #[error("no media source backend configured")]
    NoBackend,

    /// Classified media source failure
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Task-related error
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Result bundle creation failed
    #[error("archive error: {0}")]
    Archive(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new submissions
    #[error("shutdown in progress: not accepting new submissions")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Archive(e.to_string())
    }
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
/// It follows a standard format with machine-readable error codes,
/// human-readable messages, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "task_not_found",
///     "message": "task 1a2b3c4d not found",
///     "details": {
///       "task_id": "1a2b3c4d"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "task_not_found", "validation_error")
    ///
    /// Clients can use this for programmatic error handling.
    pub code: String,

    /// Human-readable error message
    ///
    /// This is suitable for displaying to end users.
    pub message: String,

    /// Optional additional context about the error
    ///
    /// This can include fields like task_id, status, etc.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create a "service unavailable" error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("service_unavailable", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::InvalidAccountRef(_) => 400,

            // 404 Not Found
            Error::Task(TaskError::NotFound { .. }) => 404,
            Error::Task(TaskError::ResultMissing { .. }) => 404,
            Error::Source(SourceError::NotFound(_)) => 404,

            // 403 Forbidden - the account is not publicly visible
            Error::Source(SourceError::Private(_)) => 403,

            // 409 Conflict - result requested before the task finished
            Error::Task(TaskError::NotReady { .. }) => 409,

            // 502 Bad Gateway - external service errors
            Error::Source(SourceError::AuthRequired) => 502,
            Error::Source(SourceError::Other(_)) => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::Source(SourceError::RateLimited) => 503,
            Error::NoBackend => 503,
            Error::ShuttingDown => 503,

            // 500 Internal Server Error - server-side issues
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::Archive(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidAccountRef(_) => "invalid_account_ref",
            Error::NoBackend => "no_backend",
            Error::Source(e) => match e {
                SourceError::RateLimited => "rate_limited",
                SourceError::AuthRequired => "auth_required",
                SourceError::NotFound(_) => "account_not_found",
                SourceError::Private(_) => "account_private",
                SourceError::Other(_) => "source_error",
            },
            Error::Task(e) => match e {
                TaskError::NotFound { .. } => "task_not_found",
                TaskError::NotReady { .. } => "not_ready",
                TaskError::ResultMissing { .. } => "result_missing",
            },
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Archive(_) => "archive_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::Task(TaskError::NotFound { id }) => Some(serde_json::json!({
                "task_id": id,
            })),
            Error::Task(TaskError::NotReady { id, status }) => Some(serde_json::json!({
                "task_id": id,
                "status": status,
            })),
            Error::Task(TaskError::ResultMissing { id }) => Some(serde_json::json!({
                "task_id": id,
            })),
            Error::Source(SourceError::NotFound(handle)) => Some(serde_json::json!({
                "handle": handle,
            })),
            Error::Source(SourceError::Private(handle)) => Some(serde_json::json!({
                "handle": handle,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
