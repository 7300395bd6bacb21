//! Page parsing seam.
//!
//! The engine fetches pages but does not interpret HTML itself. Callers
//! plug in a [`LinkExtractor`] that turns page bodies into thread items and
//! post metadata.

use crate::error::Result;
use crate::types::{Metadata, Post, ThreadItem, ThreadLink};

/// Turns fetched page bodies into domain values
pub trait LinkExtractor: Send + Sync {
    /// Posts listed by a `vr.php` lookup of `link`
    fn thread_items(&self, link: &ThreadLink, body: &str) -> Result<Vec<ThreadItem>>;

    /// Metadata found on the page of `post`
    fn metadata(&self, post: &Post, body: &str) -> Result<Metadata>;
}
