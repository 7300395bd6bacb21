//! REST API server module
//!
//! Exposes the event log, task counters and runtime settings of a running
//! engine over HTTP.

use crate::{Config, Result, VripperEngine};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, put},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Event log
/// - `GET /events` - Stored entries (filter by `type`/`status`, paginated)
/// - `DELETE /events` - Delete every stored entry
/// - `GET /events/stream` - Server-sent events of newly appended entries
///
/// ## Tasks
/// - `GET /tasks` - Running and queued task counts
///
/// ## Settings
/// - `GET /settings` - Current settings (secrets redacted)
/// - `PUT /settings` - Replace the settings
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
pub fn create_router(engine: Arc<VripperEngine>, config: Arc<Config>) -> Router {
    let state = AppState::new(engine);

    let router = Router::new()
        .route(
            "/events",
            get(routes::list_events).delete(routes::clear_events),
        )
        .route("/events/stream", get(routes::event_stream))
        .route("/tasks", get(routes::task_stats))
        .route("/settings", get(routes::get_settings))
        .route("/settings", put(routes::update_settings))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let router = if config.api.api_key.is_some() {
        router.layer(middleware::from_fn_with_state(
            config.api.api_key.clone(),
            auth::require_api_key,
        ))
    } else {
        router
    };

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer for the configured origins ("*" or an empty list
/// allows any origin)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    let layer = if allow_any || origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(allowed))
    };

    layer.allow_methods(Any).allow_headers(Any)
}

/// Serve the API on `config.api.bind_address` until the server stops
pub async fn start_api_server(engine: Arc<VripperEngine>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;

    let app = create_router(engine, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}
