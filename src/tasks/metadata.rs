//! Resolve metadata of a post.

use super::{Task, TaskContext};
use crate::config::Config;
use crate::error::Result;
use crate::transport::{AuthContext, PreparedRequest};
use crate::types::{LogType, Post};
use std::sync::Arc;

/// Fetches the post page and stores who posted it and its alternative
/// titles; gated by `fetch_metadata`
pub struct MetadataTask {
    post: Arc<Post>,
    cache_miss: bool,
    auth: AuthContext,
}

impl MetadataTask {
    /// Create the unit for `post`
    pub fn new(post: Arc<Post>, cache_miss: bool, auth: AuthContext) -> Self {
        Self {
            post,
            cache_miss,
            auth,
        }
    }
}

#[async_trait::async_trait]
impl Task for MetadataTask {
    fn log_type(&self) -> LogType {
        if self.cache_miss {
            LogType::MetadataCacheMiss
        } else {
            LogType::Metadata
        }
    }

    fn failure_message(&self) -> String {
        format!("Failed to fetch metadata for {}", self.post)
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.viper.fetch_metadata
    }

    async fn perform(&self, config: &Config, ctx: &TaskContext) -> Result<Option<String>> {
        let response = ctx
            .transport
            .execute(
                PreparedRequest::get(self.post.url.as_str())
                    .header("Referer", config.viper.host.as_str()),
                &self.auth,
            )
            .await?
            .error_for_status(&self.post.url)?;

        let metadata = ctx.extractor.metadata(&self.post, &response.text())?;
        ctx.posts.save_metadata(&self.post, &metadata).await?;

        tracing::debug!(
            post_id = %self.post.post_id,
            posted_by = ?metadata.posted_by,
            names = metadata.resolved_names.len(),
            "Metadata resolved"
        );
        Ok(None)
    }
}
