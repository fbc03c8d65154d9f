use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{NewPost, PostRecord, User, UserId};
use crate::Result;

/// Storage for user accounts and their single active refresh token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `DatabaseError::Duplicate` when the username is taken.
    async fn create_user(&self, user: &User) -> Result<User>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Overwrites whatever refresh token the user held.
    async fn store_refresh_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Replaces `current` with `next` only if `current` is still the stored
    /// token. Returns false when another request rotated it first.
    async fn rotate_refresh_token(
        &self,
        user_id: UserId,
        current: &str,
        next: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Storage for posts. Every returned record carries its author's username
/// and its direct reply count as of the read.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Posts without a parent, newest first.
    async fn list_top_level_posts(&self) -> Result<Vec<PostRecord>>;

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>>;

    /// Direct replies of `parent_id`, oldest first.
    async fn list_replies(&self, parent_id: i64) -> Result<Vec<PostRecord>>;

    /// True if a post with this id exists and is not deleted.
    async fn active_post_exists(&self, id: i64) -> Result<bool>;

    /// Inserts the post. Returns `None` without inserting when the post names
    /// a parent that is missing or deleted at insert time.
    async fn insert_post(&self, post: &NewPost) -> Result<Option<PostRecord>>;

    /// Returns `None` when the post is missing or deleted.
    async fn update_content(&self, id: i64, content: &str) -> Result<Option<PostRecord>>;

    async fn mark_deleted(&self, id: i64) -> Result<()>;

    /// Physically removes the post if it has no replies. Returns whether a
    /// row was removed.
    async fn remove_post_if_unreplied(&self, id: i64) -> Result<bool>;

    async fn count_replies(&self, id: i64) -> Result<i64>;
}
