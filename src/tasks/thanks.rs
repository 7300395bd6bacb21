//! Leave a "thanks" on a post.

use super::{Task, TaskContext};
use crate::config::Config;
use crate::error::Result;
use crate::transport::{AuthContext, PreparedRequest};
use crate::types::{LogType, Post};
use crate::utils::strip_scheme;
use std::sync::Arc;

/// Posts a thanks for `post` under an authenticated session
///
/// Runs only when login and thanks are both enabled and the session is
/// authenticated. The response is ignored: only a failure to get one is
/// reported.
pub struct ThanksTask {
    post: Arc<Post>,
    authenticated: bool,
    auth: AuthContext,
}

impl ThanksTask {
    /// Create the unit for `post`
    pub fn new(post: Arc<Post>, authenticated: bool, auth: AuthContext) -> Self {
        Self {
            post,
            authenticated,
            auth,
        }
    }

    /// The request sent to the forum
    pub fn request(&self, config: &Config) -> PreparedRequest {
        let host = config.viper.host.as_str();
        PreparedRequest::post(format!("{}/post_thanks.php", host))
            .header("Referer", host)
            .header("Host", strip_scheme(host))
            .form(&[
                ("do", "post_thanks_add"),
                ("using_ajax", "1"),
                ("p", self.post.post_id.as_str()),
                ("securitytoken", self.post.token.as_str()),
            ])
    }
}

#[async_trait::async_trait]
impl Task for ThanksTask {
    fn log_type(&self) -> LogType {
        LogType::Thanks
    }

    fn failure_message(&self) -> String {
        format!("Failed to leave a thanks for {}", self.post)
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.viper.login && self.authenticated && config.viper.thanks
    }

    async fn perform(&self, config: &Config, ctx: &TaskContext) -> Result<Option<String>> {
        ctx.transport
            .execute(self.request(config), &self.auth)
            .await?;
        tracing::debug!(post_id = %self.post.post_id, "Thanks posted");
        Ok(None)
    }
}
