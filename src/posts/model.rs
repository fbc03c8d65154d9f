use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{PostRecord, UserId};
use crate::error::PostError;

pub const DELETED_PLACEHOLDER: &str = "[deleted]";

/// Lifecycle of a post. The only transition is `Active -> Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostStatus {
    Active,
    Deleted,
}

impl PostStatus {
    pub fn from_flag(is_deleted: bool) -> Self {
        if is_deleted {
            PostStatus::Deleted
        } else {
            PostStatus::Active
        }
    }

    pub fn is_deleted(self) -> bool {
        self == PostStatus::Deleted
    }

    /// Deleting is terminal; deleting a deleted post leaves it deleted.
    pub fn mark_deleted(self) -> Self {
        PostStatus::Deleted
    }

    pub fn ensure_editable(self) -> Result<(), PostError> {
        match self {
            PostStatus::Active => Ok(()),
            PostStatus::Deleted => Err(PostError::AlreadyDeleted),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorView {
    pub id: UserId,
    pub username: String,
}

/// Public projection of a post. Deleted posts never expose content or author.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<UserId>,
    pub user: Option<AuthorView>,
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<PostView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<PostView>>,
    pub comments_count: i64,
}

impl PostView {
    /// The one masking rule used by every read path.
    pub fn from_record(record: PostRecord) -> Self {
        let status = record.status();
        let (content, user_id, user) = if status.is_deleted() {
            (DELETED_PLACEHOLDER.to_string(), None, None)
        } else {
            let author = AuthorView {
                id: record.user_id,
                username: record.username,
            };
            (record.content, Some(record.user_id), Some(author))
        };

        Self {
            id: record.id,
            content,
            created_at: record.created_at,
            user_id,
            user,
            is_deleted: status.is_deleted(),
            parent_id: record.parent_id,
            parent: None,
            replies: None,
            comments_count: record.comments_count,
        }
    }

    pub fn with_parent(mut self, parent: Option<PostView>) -> Self {
        self.parent = parent.map(Box::new);
        self
    }

    pub fn with_replies(mut self, replies: Vec<PostView>) -> Self {
        self.replies = Some(replies);
        self
    }
}
