//! Feed transport trait: the boundary to the board server.
//!
//! Implementations can talk HTTP to a live server or be mocked for testing.

use async_trait::async_trait;

use crate::error::FeedError;
use crate::types::{NewPost, PageRequest, RawItem};

#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Fetch one bounded page.
    ///
    /// - `Freshest`: the `limit` most recent items, newest first.
    /// - `Older`: up to `limit` items strictly before `request.before`,
    ///   newest first among themselves.
    /// - `Newer`: up to `limit` items strictly after `request.after`.
    async fn fetch_page(&self, request: PageRequest) -> Result<Vec<RawItem>, FeedError>;

    /// Create one post. Returns the server's authoritative copy, including
    /// its assigned id and timestamp.
    async fn publish(&self, post: NewPost) -> Result<RawItem, FeedError>;
}
