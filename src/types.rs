//! Core types for vripper-engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A forum gallery post
///
/// Owned by the persistence layer. Task units hold it read-only behind an
/// `Arc` for the duration of their run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Post {
    /// Host-assigned post identifier
    pub post_id: String,
    /// Thread the post belongs to
    pub thread_id: String,
    /// Post title
    pub title: String,
    /// Link to the post on the forum
    pub url: String,
    /// Anti-forgery token required for mutating actions such as "thanks"
    pub token: String,
    /// Number of images in the gallery
    pub image_count: u32,
}

impl std::fmt::Display for Post {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "post {} ({})", self.post_id, self.title)
    }
}

/// Metadata resolved for a post
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Metadata {
    /// Name of the member who created the post
    pub posted_by: Option<String>,
    /// Alternative titles found in the post body
    pub resolved_names: Vec<String>,
}

/// A thread (and optionally a single post in it) to scan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ThreadLink {
    /// Thread identifier
    pub thread_id: String,
    /// Restrict the lookup to one post of the thread
    pub post_id: Option<String>,
}

impl std::fmt::Display for ThreadLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.post_id {
            Some(post_id) => write!(f, "thread {} post {}", self.thread_id, post_id),
            None => write!(f, "thread {}", self.thread_id),
        }
    }
}

/// One gallery found while scanning a multi-post thread
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ThreadItem {
    /// Thread identifier
    pub thread_id: String,
    /// Post identifier
    pub post_id: String,
    /// Position of the post in the thread
    pub number: u32,
    /// Post title
    pub title: String,
    /// Number of images in the post
    pub image_count: u32,
    /// Link to the post
    pub url: String,
    /// Thumbnail URLs for previewing the gallery
    pub previews: Vec<String>,
    /// Summary of the image hosts used by the post
    pub hosts: String,
}

/// One downloadable image of a post
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Image {
    /// Post the image belongs to
    pub post_id: String,
    /// Position of the image inside the post (1-based)
    pub index: u32,
    /// Direct URL of the image file
    pub url: String,
}

/// Download status of an image
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    /// Waiting to be downloaded
    Pending,
    /// Transfer in progress
    Downloading,
    /// Stored on disk
    Complete,
    /// Download failed
    Error,
    /// Stopped before completion
    Stopped,
}

impl ImageStatus {
    /// Convert integer status code to ImageStatus
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => ImageStatus::Pending,
            1 => ImageStatus::Downloading,
            2 => ImageStatus::Complete,
            4 => ImageStatus::Stopped,
            _ => ImageStatus::Error,
        }
    }

    /// Convert ImageStatus to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            ImageStatus::Pending => 0,
            ImageStatus::Downloading => 1,
            ImageStatus::Complete => 2,
            ImageStatus::Error => 3,
            ImageStatus::Stopped => 4,
        }
    }
}

/// Kind of action an event log entry refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    /// A new gallery was added
    Post,
    /// Leaving a thanks on a post
    Thanks,
    /// Scanning a thread for gallery links
    Scan,
    /// Loading post metadata
    Metadata,
    /// Loading post metadata after a cache miss
    MetadataCacheMiss,
    /// Loading a multi-post link
    Queued,
    /// Loading a multi-post link after a cache miss
    QueuedCacheMiss,
    /// Downloading an image
    Download,
}

impl LogType {
    /// All log types, in display order
    pub const ALL: [LogType; 8] = [
        LogType::Post,
        LogType::Thanks,
        LogType::Scan,
        LogType::Metadata,
        LogType::MetadataCacheMiss,
        LogType::Queued,
        LogType::QueuedCacheMiss,
        LogType::Download,
    ];

    /// Stored and wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Post => "POST",
            LogType::Thanks => "THANKS",
            LogType::Scan => "SCAN",
            LogType::Metadata => "METADATA",
            LogType::MetadataCacheMiss => "METADATA_CACHE_MISS",
            LogType::Queued => "QUEUED",
            LogType::QueuedCacheMiss => "QUEUED_CACHE_MISS",
            LogType::Download => "DOWNLOAD",
        }
    }
}

impl std::fmt::Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown log type '{}'", s))
    }
}

/// Outcome recorded by an event log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStatus {
    /// The action completed
    Success,
    /// The action failed
    Error,
}

impl LogStatus {
    /// Stored and wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "SUCCESS",
            LogStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(LogStatus::Success),
            "ERROR" => Ok(LogStatus::Error),
            _ => Err(format!("unknown log status '{}'", s)),
        }
    }
}

/// Log entry about to be appended
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLogEntry {
    /// Kind of action
    pub log_type: LogType,
    /// Outcome
    pub status: LogStatus,
    /// Free text; for errors the cause followed by the error chain
    pub message: String,
}

impl NewLogEntry {
    /// An ERROR entry
    pub fn error(log_type: LogType, message: impl Into<String>) -> Self {
        Self {
            log_type,
            status: LogStatus::Error,
            message: message.into(),
        }
    }

    /// A SUCCESS entry
    pub fn success(log_type: LogType, message: impl Into<String>) -> Self {
        Self {
            log_type,
            status: LogStatus::Success,
            message: message.into(),
        }
    }
}

/// Persisted, immutable event log entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LogEntry {
    /// Unique entry identifier (increases with insertion order)
    pub id: i64,
    /// Kind of action
    #[serde(rename = "type")]
    pub log_type: LogType,
    /// Outcome
    pub status: LogStatus,
    /// Free text
    pub message: String,
    /// When the entry was created
    pub time: DateTime<Utc>,
}

/// Task activity counters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskStats {
    /// Units currently executing
    pub running: usize,
    /// Units waiting for an execution slot
    pub queued: usize,
}
