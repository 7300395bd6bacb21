//! Stopping and restarting the downloads of a post.

use super::VripperEngine;
use crate::error::{Error, Result};
use crate::tasks::DownloadTask;
use crate::types::{Image, ImageStatus};
use std::sync::Arc;

impl VripperEngine {
    /// Stop downloading a post
    ///
    /// Cancels the post's queued and running download units, waits for them
    /// to unwind, then marks every image that is not complete as Stopped.
    /// Returns the number of units cancelled.
    ///
    /// Returns `Error::NotFound` when the post was never recorded.
    pub async fn stop_post(&self, post_id: &str) -> Result<usize> {
        if self.db.get_post(post_id).await?.is_none() {
            return Err(Error::NotFound(format!("post {}", post_id)));
        }

        let cancelled = self.scheduler.stop_post(post_id).await;
        let stopped = self.db.stop_unfinished_images(post_id).await?;

        tracing::info!(post_id, cancelled, stopped, "Post stopped");
        Ok(cancelled)
    }

    /// Download again every image of a post that is not complete
    ///
    /// Refused (returns 0) while units of the post are still queued or
    /// running. Otherwise the images go back to Pending and one download
    /// unit per image is submitted with the current session. Returns the
    /// number of images resubmitted.
    pub async fn restart_post(&self, post_id: &str) -> Result<usize> {
        if self.scheduler.is_post_active(post_id) {
            tracing::warn!(post_id, "Cannot restart, downloads of the post are still running");
            return Ok(0);
        }

        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("post {}", post_id)))?;
        let images: Vec<Image> = self
            .db
            .get_images(post_id)
            .await?
            .into_iter()
            .filter(|(_, status)| *status != ImageStatus::Complete)
            .map(|(image, _)| image)
            .collect();
        if images.is_empty() {
            return Ok(0);
        }

        for image in &images {
            self.db
                .update_image_status(post_id, image.index, ImageStatus::Pending)
                .await?;
        }

        let count = images.len();
        let session = self.session().await;
        let post = Arc::new(post);
        for image in images {
            self.scheduler.submit(DownloadTask::new(
                post.clone(),
                image,
                session.context.clone(),
            ))?;
        }

        tracing::info!(post_id, images = count, "Post restarted");
        Ok(count)
    }
}
