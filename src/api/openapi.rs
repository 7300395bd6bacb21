//! OpenAPI documentation generated with utoipa.

use utoipa::OpenApi;

/// OpenAPI document for the REST API, served at `/openapi.json`
#[derive(OpenApi)]
#[openapi(
    info(
        title = "vripper-engine REST API",
        version = "0.1.0",
        description = "Event log, task counters and runtime settings of a vripper engine",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790", description = "Local engine")
    ),
    paths(
        // Event log
        crate::api::routes::list_events,
        crate::api::routes::clear_events,
        crate::api::routes::event_stream,

        // Tasks
        crate::api::routes::task_stats,

        // Settings
        crate::api::routes::get_settings,
        crate::api::routes::update_settings,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::LogEntry,
        crate::types::LogType,
        crate::types::LogStatus,
        crate::types::TaskStats,

        crate::config::Config,
        crate::config::ViperConfig,
        crate::config::ConnectionConfig,
        crate::config::DownloadConfig,
        crate::config::RetryConfig,
        crate::config::PersistenceConfig,
        crate::config::ApiConfig,

        crate::api::routes::EventsQuery,
        crate::api::routes::EventsPage,
        crate::api::routes::ClearEventsResponse,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "events", description = "Event log"),
        (name = "tasks", description = "Task counters"),
        (name = "settings", description = "Runtime settings"),
        (name = "system", description = "Health and API documentation"),
    )
)]
pub struct ApiDoc;
