//! Database layer for vripper-engine
//!
//! Handles SQLite persistence for the event log and for post state.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`log_entries`] - Append-only event log storage and retention
//! - [`posts`] - Posts, their images, thread lookups and metadata

use crate::types::{Image, ImageStatus, LogEntry, LogStatus, LogType, Metadata, Post, ThreadItem};
use sqlx::{FromRow, sqlite::SqlitePool};

mod log_entries;
mod migrations;
mod posts;

/// Filter for event log queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Only entries of this type
    pub log_type: Option<LogType>,
    /// Only entries with this status
    pub status: Option<LogStatus>,
}

/// Event log record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct LogEntryRow {
    /// Unique database ID
    pub id: i64,
    /// Log type name (e.g. "THANKS")
    #[sqlx(rename = "type")]
    pub log_type: String,
    /// Status name ("SUCCESS" or "ERROR")
    pub status: String,
    /// Message text
    pub message: String,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
}

impl TryFrom<LogEntryRow> for LogEntry {
    type Error = crate::error::DatabaseError;

    fn try_from(row: LogEntryRow) -> std::result::Result<Self, Self::Error> {
        use chrono::{TimeZone, Utc};
        use crate::error::DatabaseError;

        Ok(LogEntry {
            id: row.id,
            log_type: row.log_type.parse().map_err(DatabaseError::InvalidValue)?,
            status: row.status.parse().map_err(DatabaseError::InvalidValue)?,
            message: row.message,
            time: Utc
                .timestamp_millis_opt(row.created_at)
                .single()
                .unwrap_or_else(Utc::now),
        })
    }
}

/// Post record from database
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    /// Post identifier
    pub post_id: String,
    /// Thread identifier
    pub thread_id: String,
    /// Post title
    pub title: String,
    /// Link to the post
    pub url: String,
    /// Anti-forgery token
    pub token: String,
    /// Number of images
    pub image_count: i64,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            post_id: row.post_id,
            thread_id: row.thread_id,
            title: row.title,
            url: row.url,
            token: row.token,
            image_count: row.image_count.max(0) as u32,
        }
    }
}

/// Metadata columns of a post (resolved names stored as JSON)
#[derive(Debug, Clone, FromRow)]
pub struct MetadataRow {
    /// Poster name
    pub posted_by: Option<String>,
    /// JSON array of alternative titles
    pub resolved_names: Option<String>,
}

impl From<MetadataRow> for Metadata {
    fn from(row: MetadataRow) -> Self {
        Metadata {
            posted_by: row.posted_by,
            resolved_names: row
                .resolved_names
                .and_then(|json| serde_json::from_str(&json).ok())
                .unwrap_or_default(),
        }
    }
}

/// Image record from database
#[derive(Debug, Clone, FromRow)]
pub struct ImageRow {
    /// Post the image belongs to
    pub post_id: String,
    /// Position inside the post
    pub idx: i64,
    /// Image URL
    pub url: String,
    /// Status code (see [`ImageStatus::to_i32`])
    pub status: i32,
}

impl ImageRow {
    /// Split the row into the image and its status
    pub fn into_parts(self) -> (Image, ImageStatus) {
        (
            Image {
                post_id: self.post_id,
                index: self.idx.max(0) as u32,
                url: self.url,
            },
            ImageStatus::from_i32(self.status),
        )
    }
}

/// Thread lookup result from database
#[derive(Debug, Clone, FromRow)]
pub struct ThreadItemRow {
    /// Thread identifier
    pub thread_id: String,
    /// Post identifier
    pub post_id: String,
    /// Position of the post in the thread
    pub number: i64,
    /// Post title
    pub title: String,
    /// Number of images
    pub image_count: i64,
    /// Link to the post
    pub url: String,
    /// JSON array of preview URLs
    pub previews: String,
    /// Host summary
    pub hosts: String,
}

impl From<ThreadItemRow> for ThreadItem {
    fn from(row: ThreadItemRow) -> Self {
        ThreadItem {
            thread_id: row.thread_id,
            post_id: row.post_id,
            number: row.number.max(0) as u32,
            title: row.title,
            image_count: row.image_count.max(0) as u32,
            url: row.url,
            previews: serde_json::from_str(&row.previews).unwrap_or_default(),
            hosts: row.hosts,
        }
    }
}

/// Database handle for vripper-engine
pub struct Database {
    pool: SqlitePool,
}
