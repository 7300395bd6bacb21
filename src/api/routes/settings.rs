//! Settings handlers.

use crate::api::AppState;
use crate::config::Config;
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

/// GET /settings - Current settings (password and API key redacted)
#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    responses(
        (status = 200, description = "Current settings", body = Config)
    )
)]
pub async fn get_settings(State(state): State<AppState>) -> Json<Config> {
    Json(state.engine.settings().redacted())
}

/// PUT /settings - Replace the settings
///
/// Units that have not started yet run under the new settings. Secrets
/// sent back as the redaction placeholder keep their stored value.
#[utoipa::path(
    put,
    path = "/settings",
    tag = "settings",
    request_body = Config,
    responses(
        (status = 200, description = "Settings updated", body = Config),
        (status = 400, description = "Invalid settings", body = crate::error::ApiError)
    )
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Json(mut config): Json<Config>,
) -> Response {
    config.restore_secrets(&state.engine.settings());
    match state.engine.update_settings(config).await {
        Ok(()) => get_settings(State(state)).await.into_response(),
        Err(e) => e.into_response(),
    }
}
