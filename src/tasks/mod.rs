//! Task units and their shared execution wrapper.
//!
//! A task unit performs one network action against the forum or an image
//! host. Each variant implements [`Task`]; [`execute`] runs any of them
//! under the same rules:
//!
//! - the unit is counted on the active-task gauge for its whole run, and
//!   uncounted on every exit path (return, error, panic, dropped future)
//! - the configuration snapshot is read when the unit starts, and a unit
//!   whose settings gate is closed does nothing at all
//! - errors and panics never escape; they become one ERROR entry in the
//!   event log

mod context;
mod download;
mod metadata;
mod scan;
mod thanks;

pub use context::TaskContext;
pub use download::DownloadTask;
pub use metadata::MetadataTask;
pub use scan::{ScanMode, ScanTask};
pub use thanks::ThanksTask;

use crate::config::Config;
use crate::error::Result;
use crate::types::{LogType, NewLogEntry};
use crate::utils::format_error_chain;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// One kind of network action
#[async_trait::async_trait]
pub trait Task: Send + Sync {
    /// Event log type used for this unit's entries
    fn log_type(&self) -> LogType;

    /// First line of the ERROR entry written when the unit fails
    fn failure_message(&self) -> String;

    /// Whether the current settings allow this unit to run
    fn is_enabled(&self, _config: &Config) -> bool {
        true
    }

    /// Perform the action
    ///
    /// `Ok(Some(message))` records a SUCCESS entry with `message`;
    /// `Ok(None)` records nothing.
    async fn perform(&self, config: &Config, ctx: &TaskContext) -> Result<Option<String>>;

    /// Host whose per-host slot this unit must hold while it runs
    fn host(&self) -> Option<String> {
        None
    }

    /// Post the unit works for, so the post can be stopped as a whole
    fn post_id(&self) -> Option<&str> {
        None
    }

    /// Called by the scheduler when the unit is cancelled while queued or
    /// running
    async fn cancelled(&self, _ctx: &TaskContext) {}
}

/// How a unit ended, for status reporting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The settings gate was closed; nothing was done
    Skipped,
    /// The action completed
    Succeeded,
    /// The action failed or panicked and an ERROR entry was attempted
    Failed,
}

/// A unit of work accepted by the scheduler
pub enum TaskUnit {
    /// Thread or multi-post lookup
    Scan(ScanTask),
    /// Post metadata fetch
    Metadata(MetadataTask),
    /// Image download
    Download(DownloadTask),
    /// "Thanks" on a post
    Thanks(ThanksTask),
}

impl TaskUnit {
    /// The variant as a [`Task`]
    pub fn as_task(&self) -> &dyn Task {
        match self {
            TaskUnit::Scan(task) => task,
            TaskUnit::Metadata(task) => task,
            TaskUnit::Download(task) => task,
            TaskUnit::Thanks(task) => task,
        }
    }

    /// Run the unit under the shared execution rules
    pub async fn run(&self, ctx: &TaskContext) -> TaskOutcome {
        execute(self.as_task(), ctx).await
    }
}

impl From<ScanTask> for TaskUnit {
    fn from(task: ScanTask) -> Self {
        TaskUnit::Scan(task)
    }
}

impl From<MetadataTask> for TaskUnit {
    fn from(task: MetadataTask) -> Self {
        TaskUnit::Metadata(task)
    }
}

impl From<DownloadTask> for TaskUnit {
    fn from(task: DownloadTask) -> Self {
        TaskUnit::Download(task)
    }
}

impl From<ThanksTask> for TaskUnit {
    fn from(task: ThanksTask) -> Self {
        TaskUnit::Thanks(task)
    }
}

/// Run `task`: count it, gate it, perform it, and log its failure
pub async fn execute(task: &dyn Task, ctx: &TaskContext) -> TaskOutcome {
    let _guard = ctx.gauge.enter();
    let log_type = task.log_type();

    let config = ctx.settings.current_snapshot();
    if !task.is_enabled(&config) {
        tracing::debug!(%log_type, "Task disabled by settings, skipping");
        return TaskOutcome::Skipped;
    }

    let result = AssertUnwindSafe(task.perform(&config, ctx))
        .catch_unwind()
        .await;

    match result {
        Ok(Ok(success)) => {
            if let Some(message) = success {
                record(ctx, NewLogEntry::success(log_type, message)).await;
            }
            TaskOutcome::Succeeded
        }
        Ok(Err(e)) => {
            let cause = format_error_chain(&e);
            tracing::warn!(%log_type, error = %cause, "{}", task.failure_message());
            let message = format!("{}\n{}", task.failure_message(), cause);
            record(ctx, NewLogEntry::error(log_type, message)).await;
            TaskOutcome::Failed
        }
        Err(panic) => {
            let cause = panic_message(panic.as_ref());
            tracing::error!(%log_type, panic = %cause, "Task panicked");
            let message = format!("{}\npanicked: {}", task.failure_message(), cause);
            record(ctx, NewLogEntry::error(log_type, message)).await;
            TaskOutcome::Failed
        }
    }
}

/// Append an entry; a failing store only loses the entry
async fn record(ctx: &TaskContext, entry: NewLogEntry) {
    let log_type = entry.log_type;
    if let Err(e) = ctx.event_log.append(entry).await {
        tracing::error!(
            %log_type,
            error = %format_error_chain(&e),
            "Failed to record event log entry, dropping it"
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
