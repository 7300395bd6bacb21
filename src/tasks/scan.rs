//! Look up the galleries of a thread.

use super::{Task, TaskContext};
use crate::config::Config;
use crate::error::Result;
use crate::transport::{AuthContext, PreparedRequest};
use crate::types::{LogType, ThreadLink};

/// Why a lookup is being made
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanMode {
    /// A link added directly by the user
    Direct,
    /// Lookup of a multi-post link queued for the user to pick from
    Queued {
        /// The lookup was not found in the cache
        cache_miss: bool,
    },
}

/// Fetches `vr.php` for a thread (or one post of it), parses the listed
/// posts and stores them
pub struct ScanTask {
    link: ThreadLink,
    mode: ScanMode,
    auth: AuthContext,
}

impl ScanTask {
    /// Create the unit for `link`
    pub fn new(link: ThreadLink, mode: ScanMode, auth: AuthContext) -> Self {
        Self { link, mode, auth }
    }

    /// Lookup URL on the configured host
    pub fn url(&self, config: &Config) -> String {
        match &self.link.post_id {
            Some(post_id) => format!("{}/vr.php?p={}", config.viper.host, post_id),
            None => format!("{}/vr.php?t={}", config.viper.host, self.link.thread_id),
        }
    }
}

#[async_trait::async_trait]
impl Task for ScanTask {
    fn log_type(&self) -> LogType {
        match self.mode {
            ScanMode::Direct => LogType::Scan,
            ScanMode::Queued { cache_miss: false } => LogType::Queued,
            ScanMode::Queued { cache_miss: true } => LogType::QueuedCacheMiss,
        }
    }

    fn failure_message(&self) -> String {
        match self.mode {
            ScanMode::Direct => format!("Failed to scan {}", self.link),
            ScanMode::Queued { .. } => format!("Failed to load links of {}", self.link),
        }
    }

    async fn perform(&self, config: &Config, ctx: &TaskContext) -> Result<Option<String>> {
        let url = self.url(config);
        let response = ctx
            .transport
            .execute(
                PreparedRequest::get(url.as_str()).header("Referer", config.viper.host.as_str()),
                &self.auth,
            )
            .await?
            .error_for_status(&url)?;

        let items = ctx.extractor.thread_items(&self.link, &response.text())?;
        ctx.posts.save_thread_items(&self.link, &items).await?;

        tracing::info!(link = %self.link, posts = items.len(), "Thread scanned");
        Ok(Some(format!("Found {} posts in {}", items.len(), self.link)))
    }
}
