//! Download one image of a post.

use super::{Task, TaskContext};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::transport::{AuthContext, PreparedRequest, Response};
use crate::types::{Image, ImageStatus, LogType, Post};
use crate::utils::{ImageKind, file_name_from_url, sanitize_file_name, with_image_extension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fetches an image and stores it under the post's folder
///
/// The image status moves Pending -> Downloading -> Complete, or to Error
/// when anything fails, or to Stopped when the unit is cancelled. Bytes are
/// written to a `.tmp` file named after the image index first and renamed
/// into place once the format is known.
pub struct DownloadTask {
    post: Arc<Post>,
    image: Image,
    auth: AuthContext,
}

impl DownloadTask {
    /// Create the unit for `image` of `post`
    pub fn new(post: Arc<Post>, image: Image, auth: AuthContext) -> Self {
        Self { post, image, auth }
    }

    /// Folder receiving every image of the post
    pub fn post_folder(&self, config: &Config) -> PathBuf {
        config.download.download_dir.join(sanitize_file_name(&format!(
            "{}_{}",
            self.post.title, self.post.post_id
        )))
    }

    fn url_file_name(&self) -> String {
        file_name_from_url(&self.image.url, &format!("image_{}", self.image.index))
    }

    /// File name before the format is known
    fn base_name(&self, config: &Config) -> String {
        let name = self.url_file_name();
        if config.download.force_order {
            format!("{:03}_{}", self.image.index, name)
        } else {
            name
        }
    }

    /// Unique per image, even when several images share a file name
    fn temp_path(&self, config: &Config) -> PathBuf {
        self.post_folder(config).join(format!(
            "{:03}_{}.tmp",
            self.image.index,
            self.url_file_name()
        ))
    }

    async fn fetch(&self, config: &Config, ctx: &TaskContext) -> Result<Response> {
        let request = PreparedRequest::get(self.image.url.as_str())
            .header("Referer", self.post.url.as_str());

        let response = with_retry(&config.retry, || {
            let request = request.clone();
            async move {
                ctx.transport
                    .execute(request, &self.auth)
                    .await?
                    .error_for_status(&self.image.url)
            }
        })
        .await?;

        Ok(response)
    }

    async fn download(&self, config: &Config, ctx: &TaskContext) -> Result<PathBuf> {
        let response = self.fetch(config, ctx).await?;

        let Some(kind) = ImageKind::detect(&response.body) else {
            return Err(Error::Extraction(format!(
                "Image file is not recognized: {}",
                self.image.url
            )));
        };

        let folder = self.post_folder(config);
        tokio::fs::create_dir_all(&folder).await?;

        let tmp = self.temp_path(config);
        if let Err(e) = tokio::fs::write(&tmp, &response.body).await {
            remove_quietly(&tmp).await;
            return Err(e.into());
        }

        let target = folder.join(with_image_extension(&self.base_name(config), kind));
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            remove_quietly(&tmp).await;
            return Err(e.into());
        }

        Ok(target)
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(path = %path.display(), error = %e, "Could not remove temporary file");
    }
}

#[async_trait::async_trait]
impl Task for DownloadTask {
    fn log_type(&self) -> LogType {
        LogType::Download
    }

    fn failure_message(&self) -> String {
        format!(
            "Failed to download image {} of {} from {}",
            self.image.index, self.post, self.image.url
        )
    }

    fn host(&self) -> Option<String> {
        url::Url::parse(&self.image.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }

    fn post_id(&self) -> Option<&str> {
        Some(&self.post.post_id)
    }

    async fn cancelled(&self, ctx: &TaskContext) {
        let config = ctx.settings.current_snapshot();
        let tmp = self.temp_path(&config);
        if tokio::fs::try_exists(&tmp).await.unwrap_or(false) {
            remove_quietly(&tmp).await;
        }
        if let Err(e) = ctx
            .posts
            .set_image_status(&self.image, ImageStatus::Stopped)
            .await
        {
            tracing::warn!(
                post_id = %self.post.post_id,
                index = self.image.index,
                error = %e,
                "Failed to mark image as stopped"
            );
        }
    }

    async fn perform(&self, config: &Config, ctx: &TaskContext) -> Result<Option<String>> {
        ctx.posts
            .set_image_status(&self.image, ImageStatus::Downloading)
            .await?;

        match self.download(config, ctx).await {
            Ok(path) => {
                ctx.posts
                    .set_image_status(&self.image, ImageStatus::Complete)
                    .await?;
                tracing::debug!(
                    post_id = %self.post.post_id,
                    index = self.image.index,
                    path = %path.display(),
                    "Image downloaded"
                );
                Ok(None)
            }
            Err(e) => {
                if let Err(store_err) = ctx
                    .posts
                    .set_image_status(&self.image, ImageStatus::Error)
                    .await
                {
                    tracing::warn!(
                        post_id = %self.post.post_id,
                        index = self.image.index,
                        error = %store_err,
                        "Failed to mark image as failed"
                    );
                }
                Err(e)
            }
        }
    }
}
