//! Event log handlers.

use super::{ClearEventsResponse, EventsPage, EventsQuery};
use crate::api::AppState;
use crate::api::error_response::bad_request;
use crate::db::LogFilter;
use crate::types::{LogEntry, LogStatus, LogType};
use axum::{
    Json,
    extract::{Query, State},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 1000;

fn parse_filter(query: &EventsQuery) -> Result<LogFilter, String> {
    let log_type = query
        .log_type
        .as_deref()
        .map(str::parse::<LogType>)
        .transpose()?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<LogStatus>)
        .transpose()?;
    Ok(LogFilter { log_type, status })
}

/// GET /events - Stored event log entries
#[utoipa::path(
    get,
    path = "/events",
    tag = "events",
    params(
        ("type" = Option<String>, Query, description = "Filter by log type, e.g. THANKS"),
        ("status" = Option<String>, Query, description = "Filter by status (SUCCESS/ERROR)"),
        ("limit" = Option<i64>, Query, description = "Maximum number of entries to return"),
        ("offset" = Option<i64>, Query, description = "Number of entries to skip")
    ),
    responses(
        (status = 200, description = "Event log entries, newest first", body = EventsPage),
        (status = 400, description = "Invalid filter", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let filter = match parse_filter(&query) {
        Ok(filter) => filter,
        Err(message) => return bad_request(message),
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT) as usize;
    let offset = query.offset.unwrap_or(0).max(0) as usize;

    let items = match state.engine.events(&filter, limit, offset).await {
        Ok(items) => items,
        Err(e) => return e.into_response(),
    };
    match state.engine.event_count(&filter).await {
        Ok(total) => Json(EventsPage {
            items,
            total,
            limit,
            offset,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /events - Delete every stored entry
#[utoipa::path(
    delete,
    path = "/events",
    tag = "events",
    responses(
        (status = 200, description = "Number of deleted entries", body = ClearEventsResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn clear_events(State(state): State<AppState>) -> Response {
    match state.engine.clear_events().await {
        Ok(deleted) => Json(ClearEventsResponse { deleted }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /events/stream - Server-sent events of newly appended entries
#[utoipa::path(
    get,
    path = "/events/stream",
    tag = "events",
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(state.engine.subscribe()).filter_map(to_sse);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse(
    received: Result<LogEntry, BroadcastStreamRecvError>,
) -> Option<Result<SseEvent, Infallible>> {
    match received {
        Ok(entry) => match serde_json::to_string(&entry) {
            Ok(data) => Some(Ok(SseEvent::default()
                .event(entry.log_type.as_str())
                .id(entry.id.to_string())
                .data(data))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize log entry");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE client lagged");
            Some(Ok(SseEvent::default()
                .event("lagged")
                .data(format!(r#"{{"skipped":{}}}"#, skipped))))
        }
    }
}
