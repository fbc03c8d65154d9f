use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::models::{NewPost, PostRecord, User, UserId};
use crate::db::repository::{PostRepository, UserRepository};
use crate::error::DatabaseError;
use crate::Result;

#[derive(Debug, Clone)]
struct StoredPost {
    id: i64,
    content: String,
    created_at: DateTime<Utc>,
    user_id: UserId,
    parent_id: Option<i64>,
    is_deleted: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    posts: BTreeMap<i64, StoredPost>,
    last_post_id: i64,
}

impl MemoryState {
    fn reply_count(&self, id: i64) -> i64 {
        self.posts.values().filter(|p| p.parent_id == Some(id)).count() as i64
    }

    fn is_active(&self, id: i64) -> bool {
        self.posts.get(&id).map_or(false, |p| !p.is_deleted)
    }

    fn record(&self, post: &StoredPost) -> PostRecord {
        let username = self
            .users
            .get(&post.user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();

        PostRecord {
            id: post.id,
            content: post.content.clone(),
            created_at: post.created_at,
            user_id: post.user_id,
            username,
            parent_id: post.parent_id,
            is_deleted: post.is_deleted,
            comments_count: self.reply_count(post.id),
        }
    }
}

/// In-process store with the same semantics as the Postgres one. Each call
/// holds the lock for its whole read-modify-write.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(DatabaseError::Duplicate.into());
        }
        state.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn store_refresh_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.refresh_token = Some(token.to_string());
            user.refresh_token_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        user_id: UserId,
        current: &str,
        next: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&user_id) {
            Some(user) if user.refresh_token.as_deref() == Some(current) => {
                user.refresh_token = Some(next.to_string());
                user.refresh_token_expires_at = Some(expires_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn list_top_level_posts(&self) -> Result<Vec<PostRecord>> {
        let state = self.state.read().await;
        let mut posts: Vec<PostRecord> = state
            .posts
            .values()
            .filter(|p| p.parent_id.is_none())
            .map(|p| state.record(p))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>> {
        let state = self.state.read().await;
        Ok(state.posts.get(&id).map(|p| state.record(p)))
    }

    async fn list_replies(&self, parent_id: i64) -> Result<Vec<PostRecord>> {
        let state = self.state.read().await;
        let mut replies: Vec<PostRecord> = state
            .posts
            .values()
            .filter(|p| p.parent_id == Some(parent_id))
            .map(|p| state.record(p))
            .collect();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(replies)
    }

    async fn active_post_exists(&self, id: i64) -> Result<bool> {
        Ok(self.state.read().await.is_active(id))
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Option<PostRecord>> {
        let mut state = self.state.write().await;
        if let Some(parent_id) = post.parent_id {
            if !state.is_active(parent_id) {
                return Ok(None);
            }
        }

        state.last_post_id += 1;
        let stored = StoredPost {
            id: state.last_post_id,
            content: post.content.clone(),
            created_at: post.created_at,
            user_id: post.user_id,
            parent_id: post.parent_id,
            is_deleted: false,
        };
        let record = state.record(&stored);
        state.posts.insert(stored.id, stored);
        Ok(Some(record))
    }

    async fn update_content(&self, id: i64, content: &str) -> Result<Option<PostRecord>> {
        let mut state = self.state.write().await;
        let updated = match state.posts.get_mut(&id) {
            Some(post) if !post.is_deleted => {
                post.content = content.to_string();
                post.clone()
            }
            _ => return Ok(None),
        };
        Ok(Some(state.record(&updated)))
    }

    async fn mark_deleted(&self, id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(post) = state.posts.get_mut(&id) {
            post.is_deleted = true;
        }
        Ok(())
    }

    async fn remove_post_if_unreplied(&self, id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.reply_count(id) > 0 {
            return Ok(false);
        }
        Ok(state.posts.remove(&id).is_some())
    }

    async fn count_replies(&self, id: i64) -> Result<i64> {
        Ok(self.state.read().await.reply_count(id))
    }
}
