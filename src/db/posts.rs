//! Posts, their images, thread lookups and metadata.

use crate::types::{Image, ImageStatus, Metadata, Post, ThreadItem};
use crate::{Error, Result};

use super::{Database, ImageRow, MetadataRow, PostRow, ThreadItemRow};

impl Database {
    /// Insert or replace a post
    pub async fn upsert_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (post_id, thread_id, title, url, token, image_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(post_id) DO UPDATE SET
                thread_id = excluded.thread_id,
                title = excluded.title,
                url = excluded.url,
                token = excluded.token,
                image_count = excluded.image_count
            "#,
        )
        .bind(&post.post_id)
        .bind(&post.thread_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.token)
        .bind(post.image_count as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(())
    }

    /// Get a post by id
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT post_id, thread_id, title, url, token, image_count
            FROM posts WHERE post_id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(row.map(Post::from))
    }

    /// Store resolved metadata for a post
    ///
    /// Returns `Error::NotFound` when the post is unknown.
    pub async fn update_post_metadata(&self, post_id: &str, metadata: &Metadata) -> Result<()> {
        let names = serde_json::to_string(&metadata.resolved_names)?;
        let result =
            sqlx::query("UPDATE posts SET posted_by = ?, resolved_names = ? WHERE post_id = ?")
                .bind(&metadata.posted_by)
                .bind(names)
                .bind(post_id)
                .execute(&self.pool)
                .await
                .map_err(Error::Sqlx)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("post {}", post_id)));
        }
        Ok(())
    }

    /// Metadata stored for a post, if the post exists
    pub async fn get_post_metadata(&self, post_id: &str) -> Result<Option<Metadata>> {
        let row = sqlx::query_as::<_, MetadataRow>(
            "SELECT posted_by, resolved_names FROM posts WHERE post_id = ?",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(row.map(Metadata::from))
    }

    /// Insert images of a post as Pending (existing images are left alone)
    pub async fn insert_images(&self, images: &[Image]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Sqlx)?;
        for image in images {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO images (post_id, idx, url, status)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&image.post_id)
            .bind(image.index as i64)
            .bind(&image.url)
            .bind(ImageStatus::Pending.to_i32())
            .execute(&mut *tx)
            .await
            .map_err(Error::Sqlx)?;
        }
        tx.commit().await.map_err(Error::Sqlx)?;
        Ok(())
    }

    /// Images of a post with their status, in index order
    pub async fn get_images(&self, post_id: &str) -> Result<Vec<(Image, ImageStatus)>> {
        let rows = sqlx::query_as::<_, ImageRow>(
            "SELECT post_id, idx, url, status FROM images WHERE post_id = ? ORDER BY idx",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows.into_iter().map(ImageRow::into_parts).collect())
    }

    /// Update the status of one image
    pub async fn update_image_status(
        &self,
        post_id: &str,
        index: u32,
        status: ImageStatus,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE images SET status = ? WHERE post_id = ? AND idx = ?")
            .bind(status.to_i32())
            .bind(post_id)
            .bind(index as i64)
            .execute(&self.pool)
            .await
            .map_err(Error::Sqlx)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("image {} of post {}", index, post_id)));
        }
        Ok(())
    }

    /// Mark every image of a post that is not complete as Stopped
    ///
    /// Returns the number of images changed.
    pub async fn stop_unfinished_images(&self, post_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE images SET status = ? WHERE post_id = ? AND status NOT IN (?, ?)",
        )
        .bind(ImageStatus::Stopped.to_i32())
        .bind(post_id)
        .bind(ImageStatus::Complete.to_i32())
        .bind(ImageStatus::Stopped.to_i32())
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(result.rows_affected())
    }

    /// Replace the stored lookup results of a thread
    ///
    /// With `post_id` set only that post's previous result is replaced; the
    /// rest of the thread is kept.
    pub async fn replace_thread_items(
        &self,
        thread_id: &str,
        post_id: Option<&str>,
        items: &[ThreadItem],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Sqlx)?;

        sqlx::query("DELETE FROM thread_items WHERE thread_id = ?1 AND (?2 IS NULL OR post_id = ?2)")
            .bind(thread_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Sqlx)?;

        for item in items {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO thread_items (
                    thread_id, post_id, number, title, image_count, url, previews, hosts
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(thread_id)
            .bind(&item.post_id)
            .bind(item.number as i64)
            .bind(&item.title)
            .bind(item.image_count as i64)
            .bind(&item.url)
            .bind(serde_json::to_string(&item.previews)?)
            .bind(&item.hosts)
            .execute(&mut *tx)
            .await
            .map_err(Error::Sqlx)?;
        }

        tx.commit().await.map_err(Error::Sqlx)?;
        Ok(())
    }

    /// Stored lookup results of a thread, in post order
    pub async fn get_thread_items(&self, thread_id: &str) -> Result<Vec<ThreadItem>> {
        let rows = sqlx::query_as::<_, ThreadItemRow>(
            r#"
            SELECT thread_id, post_id, number, title, image_count, url, previews, hosts
            FROM thread_items WHERE thread_id = ?
            ORDER BY number
            "#,
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows.into_iter().map(ThreadItem::from).collect())
    }
}
