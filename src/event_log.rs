//! Append-only event log.
//!
//! Every task failure ends up here as one [`LogEntry`]. Entries are stored
//! in SQLite, trimmed to the configured retention, and broadcast to live
//! subscribers (the SSE stream of the REST API, for instance).

use crate::db::{Database, LogFilter};
use crate::error::Result;
use crate::settings::SettingsService;
use crate::types::{LogEntry, NewLogEntry};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Durable append for log entries
///
/// Implementations must accept concurrent calls.
#[async_trait::async_trait]
pub trait EventLogStore: Send + Sync {
    /// Persist `entry` and return it with its id and timestamp
    async fn append(&self, entry: NewLogEntry) -> Result<LogEntry>;
}

/// SQLite-backed event log with a live broadcast feed
#[derive(Clone)]
pub struct EventLog {
    db: Arc<Database>,
    event_tx: broadcast::Sender<LogEntry>,
    settings: SettingsService,
}

impl EventLog {
    /// Create an event log over `db`, retaining as many entries as the
    /// current settings allow
    pub fn new(db: Arc<Database>, settings: SettingsService) -> Self {
        // Buffer for subscribers that fall behind; lagging ones skip ahead
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            db,
            event_tx,
            settings,
        }
    }

    /// Receive every entry appended from now on
    ///
    /// Subscribers that lag more than the channel capacity get
    /// `RecvError::Lagged` and continue with newer entries.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.event_tx.subscribe()
    }

    /// Stored entries matching `filter`, newest first
    pub async fn query(
        &self,
        filter: &LogFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LogEntry>> {
        self.db.query_log_entries(filter, limit, offset).await
    }

    /// Number of stored entries matching `filter`
    pub async fn count(&self, filter: &LogFilter) -> Result<i64> {
        self.db.count_log_entries(filter).await
    }

    /// Delete every stored entry
    pub async fn clear(&self) -> Result<u64> {
        let deleted = self.db.clear_log_entries().await?;
        tracing::info!(deleted, "Event log cleared");
        Ok(deleted)
    }
}

#[async_trait::async_trait]
impl EventLogStore for EventLog {
    async fn append(&self, entry: NewLogEntry) -> Result<LogEntry> {
        let stored = self.db.insert_log_entry(&entry).await?;

        // No subscribers is fine
        let _ = self.event_tx.send(stored.clone());

        // The entry is stored either way; retention catches up on the next append
        let keep = self.settings.current_snapshot().persistence.max_event_log_size;
        if keep > 0 {
            match self.db.prune_log_entries(keep).await {
                Ok(0) => {}
                Ok(pruned) => tracing::debug!(pruned, keep, "Pruned old event log entries"),
                Err(e) => tracing::warn!(error = %e, keep, "Failed to prune event log"),
            }
        }

        Ok(stored)
    }
}
