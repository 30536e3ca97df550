//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the reel-dl REST
//! API using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the reel-dl REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation (if enabled)
#[derive(OpenApi)]
#[openapi(
    info(
        title = "reel-dl REST API",
        version = "0.1.0",
        description = "REST API for submitting account-video archiving jobs, observing live progress, and fetching packaged results",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6789", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::submit_job,
        crate::api::routes::list_jobs,
        crate::api::routes::get_job,
        crate::api::routes::job_events,
        crate::api::routes::fetch_result,

        // System
        crate::api::routes::health_check,
        crate::api::routes::get_capabilities,
        crate::api::routes::openapi_spec,
        crate::api::routes::shutdown,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::TaskId,
        crate::types::TaskStatus,
        crate::types::TaskSnapshot,
        crate::types::ProgressFrame,
        crate::types::ResultArtifact,
        crate::types::Capabilities,
        crate::types::SourceCapabilities,

        // Submission types
        crate::downloader::Submission,
        crate::api::routes::SubmitJobRequest,

        // Config types from config.rs
        crate::config::Config,
        crate::config::StorageConfig,
        crate::config::FetchConfig,
        crate::config::RetryConfig,
        crate::config::SourceConfig,
        crate::config::HttpApiConfig,
        crate::config::ApiConfig,

        // Error types
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "jobs", description = "Job submission, progress and results"),
        (name = "system", description = "Health, capabilities and lifecycle")
    )
)]
pub struct ApiDoc;
