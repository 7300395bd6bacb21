//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`events`] - Event log queries, clearing and live stream
//! - [`tasks`] - Task counters
//! - [`settings`] - Runtime settings
//! - [`system`] - Health and OpenAPI

use serde::{Deserialize, Serialize};

mod events;
mod settings;
mod system;
mod tasks;

pub use events::*;
pub use settings::*;
pub use system::*;
pub use tasks::*;

/// Query parameters for GET /events
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct EventsQuery {
    /// Only entries of this type, e.g. `THANKS` (case-insensitive)
    #[serde(rename = "type")]
    pub log_type: Option<String>,
    /// Only entries with this status: `SUCCESS` or `ERROR` (case-insensitive)
    pub status: Option<String>,
    /// Maximum number of entries to return (default: 50, max: 1000)
    pub limit: Option<i64>,
    /// Number of entries to skip (default: 0)
    pub offset: Option<i64>,
}

/// Page of event log entries returned by GET /events
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct EventsPage {
    /// Entries, newest first
    pub items: Vec<crate::types::LogEntry>,
    /// Number of stored entries matching the filter
    pub total: i64,
    /// Limit applied
    pub limit: usize,
    /// Offset applied
    pub offset: usize,
}

/// Response of DELETE /events
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ClearEventsResponse {
    /// Number of deleted entries
    pub deleted: u64,
}
