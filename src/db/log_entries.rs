//! Event log storage and retention.

use crate::types::{LogEntry, NewLogEntry};
use crate::{Error, Result};

use super::{Database, LogEntryRow, LogFilter};

impl Database {
    /// Append an entry and return it as stored
    pub async fn insert_log_entry(&self, entry: &NewLogEntry) -> Result<LogEntry> {
        let now = chrono::Utc::now();
        let created_at = now.timestamp_millis();

        let result = sqlx::query(
            r#"
            INSERT INTO log_entries (type, status, message, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(entry.log_type.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.message)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        let row = LogEntryRow {
            id: result.last_insert_rowid(),
            log_type: entry.log_type.as_str().to_string(),
            status: entry.status.as_str().to_string(),
            message: entry.message.clone(),
            created_at,
        };
        Ok(LogEntry::try_from(row)?)
    }

    /// Query entries, newest first
    pub async fn query_log_entries(
        &self,
        filter: &LogFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, LogEntryRow>(
            r#"
            SELECT id, type, status, message, created_at
            FROM log_entries
            WHERE (?1 IS NULL OR type = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY id DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(filter.log_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        rows.into_iter()
            .map(|row| LogEntry::try_from(row).map_err(Error::from))
            .collect()
    }

    /// Count entries matching `filter`
    pub async fn count_log_entries(&self, filter: &LogFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM log_entries
            WHERE (?1 IS NULL OR type = ?1)
              AND (?2 IS NULL OR status = ?2)
            "#,
        )
        .bind(filter.log_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(count)
    }

    /// Delete every entry
    ///
    /// Returns the number of entries deleted.
    pub async fn clear_log_entries(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM log_entries")
            .execute(&self.pool)
            .await
            .map_err(Error::Sqlx)?;

        Ok(result.rows_affected())
    }

    /// Keep only the newest `keep` entries
    ///
    /// Returns the number of entries deleted.
    pub async fn prune_log_entries(&self, keep: usize) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM log_entries
            WHERE id NOT IN (
                SELECT id FROM log_entries ORDER BY id DESC LIMIT ?
            )
            "#,
        )
        .bind(keep as i64)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(result.rows_affected())
    }
}
