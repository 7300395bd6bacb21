//! Operations that turn user actions into task units.

use super::VripperEngine;
use crate::auth::AuthSession;
use crate::error::Result;
use crate::event_log::EventLogStore;
use crate::tasks::{DownloadTask, MetadataTask, ScanMode, ScanTask, ThanksTask};
use crate::types::{Image, LogType, NewLogEntry, Post, ThreadLink};
use std::sync::Arc;

impl VripperEngine {
    pub(super) async fn session(&self) -> AuthSession {
        self.session.read().await.clone()
    }

    /// Look up the galleries of a thread link added by the user
    pub async fn scan(&self, link: ThreadLink) -> Result<()> {
        let session = self.session().await;
        tracing::debug!(%link, "Submitting scan");
        self.scheduler
            .submit(ScanTask::new(link, ScanMode::Direct, session.context))
    }

    /// Look up a multi-post link queued for the user to pick from
    ///
    /// `cache_miss` only changes the log type of the unit's entries.
    pub async fn lookup_queued(&self, link: ThreadLink, cache_miss: bool) -> Result<()> {
        let session = self.session().await;
        tracing::debug!(%link, cache_miss, "Submitting queued lookup");
        self.scheduler.submit(ScanTask::new(
            link,
            ScanMode::Queued { cache_miss },
            session.context,
        ))
    }

    /// Resolve who posted `post` and its alternative titles
    ///
    /// Does nothing when `viper.fetch_metadata` is off at the time the unit
    /// starts.
    pub async fn fetch_metadata(&self, post: Post, cache_miss: bool) -> Result<()> {
        let session = self.session().await;
        self.scheduler.submit(MetadataTask::new(
            Arc::new(post),
            cache_miss,
            session.context,
        ))
    }

    /// Leave a thanks on `post`
    ///
    /// Does nothing unless login and thanks are enabled and the session is
    /// authenticated when the unit starts.
    pub async fn leave_thanks(&self, post: Post) -> Result<()> {
        let session = self.session().await;
        self.scheduler.submit(ThanksTask::new(
            Arc::new(post),
            session.authenticated,
            session.context,
        ))
    }

    /// Start downloading `post`
    ///
    /// Records the post and its images (numbered from 1 in the order
    /// given), appends a POST entry, then submits a thanks and one download
    /// unit per image.
    pub async fn download_post(&self, post: Post, image_urls: Vec<String>) -> Result<()> {
        let images: Vec<Image> = image_urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| Image {
                post_id: post.post_id.clone(),
                index: i as u32 + 1,
                url,
            })
            .collect();

        self.db.upsert_post(&post).await?;
        self.db.insert_images(&images).await?;
        self.event_log
            .append(NewLogEntry::success(
                LogType::Post,
                format!("Processing {} with {} images", post, images.len()),
            ))
            .await?;

        tracing::info!(
            post_id = %post.post_id,
            images = images.len(),
            "Post submitted for download"
        );

        let session = self.session().await;
        let post = Arc::new(post);
        self.scheduler.submit(ThanksTask::new(
            post.clone(),
            session.authenticated,
            session.context.clone(),
        ))?;
        for image in images {
            self.scheduler.submit(DownloadTask::new(
                post.clone(),
                image,
                session.context.clone(),
            ))?;
        }
        Ok(())
    }
}
