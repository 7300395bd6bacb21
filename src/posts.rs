//! Post state collaborator used by task units.

use crate::db::Database;
use crate::error::Result;
use crate::types::{Image, ImageStatus, Metadata, Post, ThreadItem, ThreadLink};

/// Records what task units learn about posts
#[async_trait::async_trait]
pub trait PostStore: Send + Sync {
    /// Store the posts found by a thread lookup
    async fn save_thread_items(&self, link: &ThreadLink, items: &[ThreadItem]) -> Result<()>;

    /// Store metadata resolved for a post
    async fn save_metadata(&self, post: &Post, metadata: &Metadata) -> Result<()>;

    /// Update the download status of an image
    async fn set_image_status(&self, image: &Image, status: ImageStatus) -> Result<()>;
}

#[async_trait::async_trait]
impl PostStore for Database {
    async fn save_thread_items(&self, link: &ThreadLink, items: &[ThreadItem]) -> Result<()> {
        self.replace_thread_items(&link.thread_id, link.post_id.as_deref(), items)
            .await
    }

    async fn save_metadata(&self, post: &Post, metadata: &Metadata) -> Result<()> {
        self.update_post_metadata(&post.post_id, metadata).await
    }

    async fn set_image_status(&self, image: &Image, status: ImageStatus) -> Result<()> {
        self.update_image_status(&image.post_id, image.index, status)
            .await
    }
}
