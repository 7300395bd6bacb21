//! Task counter handlers.

use crate::api::AppState;
use crate::types::TaskStats;
use axum::{Json, extract::State};

/// GET /tasks - Running and queued task counts
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "tasks",
    responses(
        (status = 200, description = "Task counters", body = TaskStats)
    )
)]
pub async fn task_stats(State(state): State<AppState>) -> Json<TaskStats> {
    Json(state.engine.stats())
}
