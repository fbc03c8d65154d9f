use std::sync::Arc;

use tracing::{info, warn};

use crate::db::{NewPost, PostRecord, PostRepository, UserId};
use crate::error::PostError;
use crate::posts::model::PostView;
use crate::Result;

/// What `delete_post` did to the post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    SoftDeleted,
}

pub struct PostService {
    posts: Arc<dyn PostRepository>,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostRepository>) -> Self {
        Self { posts }
    }

    /// Top-level posts, newest first, with reply counts.
    pub async fn list_posts(&self) -> Result<Vec<PostView>> {
        let posts = self.posts.list_top_level_posts().await?;
        Ok(posts.into_iter().map(PostView::from_record).collect())
    }

    /// A post with its parent summary and its direct replies.
    pub async fn get_post(&self, id: i64) -> Result<PostView> {
        let post = self.find_existing(id).await?;

        let parent = match post.parent_id {
            Some(parent_id) => self.posts.find_post(parent_id).await?.map(PostView::from_record),
            None => None,
        };
        let replies = self
            .posts
            .list_replies(id)
            .await?
            .into_iter()
            .map(PostView::from_record)
            .collect();

        Ok(PostView::from_record(post)
            .with_parent(parent)
            .with_replies(replies))
    }

    pub async fn create_post(
        &self,
        content: &str,
        author: UserId,
        parent_id: Option<i64>,
    ) -> Result<PostView> {
        if let Some(parent_id) = parent_id {
            if !self.posts.active_post_exists(parent_id).await? {
                return Err(PostError::ParentNotFound(parent_id).into());
            }
        }

        let new_post = NewPost::new(content.to_string(), author, parent_id);
        let post = match self.posts.insert_post(&new_post).await? {
            Some(post) => post,
            // Parent was deleted between the check and the insert.
            None => return Err(PostError::ParentNotFound(parent_id.unwrap_or_default()).into()),
        };

        info!("User {} created post {} (parent: {:?})", author, post.id, parent_id);
        Ok(PostView::from_record(post))
    }

    pub async fn update_post(&self, id: i64, content: &str, requester: UserId) -> Result<PostView> {
        let post = self.find_existing(id).await?;
        post.status().ensure_editable()?;
        ensure_author(&post, requester)?;

        let updated = match self.posts.update_content(id, content).await? {
            Some(updated) => updated,
            // Changed underneath us: removed, or turned into a tombstone.
            None => {
                self.find_existing(id).await?;
                return Err(PostError::AlreadyDeleted.into());
            }
        };

        info!("User {} edited post {}", requester, id);
        Ok(PostView::from_record(updated))
    }

    /// Removes the post outright when nothing replies to it, otherwise
    /// leaves a tombstone so the replies keep their parent.
    pub async fn delete_post(&self, id: i64, requester: UserId) -> Result<DeleteOutcome> {
        let post = self.find_existing(id).await?;
        ensure_author(&post, requester)?;

        let replies = self.posts.count_replies(id).await?;
        if replies == 0 && self.posts.remove_post_if_unreplied(id).await? {
            info!("User {} removed post {}", requester, id);
            return Ok(DeleteOutcome::Removed);
        }

        let current = post.status();
        if current.mark_deleted() != current {
            self.posts.mark_deleted(id).await?;
        }
        info!("User {} soft-deleted post {} with {} replies", requester, id, replies);
        Ok(DeleteOutcome::SoftDeleted)
    }

    async fn find_existing(&self, id: i64) -> Result<PostRecord> {
        self.posts
            .find_post(id)
            .await?
            .ok_or_else(|| PostError::NotFound(id).into())
    }
}

fn ensure_author(post: &PostRecord, requester: UserId) -> Result<()> {
    if post.user_id != requester {
        warn!("User {} is not the author of post {}", requester, post.id);
        return Err(PostError::Forbidden.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::MockPostRepository;
    use crate::db::{MemoryStore, User, UserRepository};
    use crate::error::AppError;
    use crate::posts::model::DELETED_PLACEHOLDER;

    async fn setup() -> (PostService, UserId, UserId) {
        let store = Arc::new(MemoryStore::new());
        let alice = store
            .create_user(&User::new("alice".into(), "hash".into()))
            .await
            .unwrap();
        let bob = store
            .create_user(&User::new("bob".into(), "hash".into()))
            .await
            .unwrap();
        (PostService::new(store), alice.id, bob.id)
    }

    fn is_post_error(err: &AppError, expected: PostError) -> bool {
        matches!(err, AppError::PostError(e) if *e == expected)
    }

    #[tokio::test]
    async fn test_thread_example() {
        let (service, alice, _) = setup().await;

        let root = service.create_post("hello", alice, None).await.unwrap();
        assert_eq!(root.id, 1);
        let reply = service.create_post("hi", alice, Some(root.id)).await.unwrap();
        assert_eq!(reply.id, 2);
        assert_eq!(reply.parent_id, Some(1));

        let detail = service.get_post(1).await.unwrap();
        assert_eq!(detail.content, "hello");
        assert_eq!(detail.comments_count, 1);
        let replies = detail.replies.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].id, 2);
        assert_eq!(replies[0].content, "hi");

        let outcome = service.delete_post(1, alice).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::SoftDeleted);

        let detail = service.get_post(1).await.unwrap();
        assert_eq!(detail.content, DELETED_PLACEHOLDER);
        assert!(detail.user.is_none());
        assert!(detail.is_deleted);
        assert_eq!(detail.comments_count, 1);
        assert_eq!(detail.replies.unwrap()[0].id, 2);
    }

    #[tokio::test]
    async fn test_reply_detail_includes_masked_parent() {
        let (service, alice, bob) = setup().await;
        let root = service.create_post("root", alice, None).await.unwrap();
        let reply = service.create_post("reply", bob, Some(root.id)).await.unwrap();
        service.delete_post(root.id, alice).await.unwrap();

        let detail = service.get_post(reply.id).await.unwrap();
        let parent = detail.parent.unwrap();
        assert_eq!(parent.id, root.id);
        assert_eq!(parent.content, DELETED_PLACEHOLDER);
        assert!(parent.user.is_none());
        assert_eq!(detail.user.unwrap().username, "bob");
    }

    #[tokio::test]
    async fn test_list_posts_top_level_newest_first() {
        let (service, alice, bob) = setup().await;
        let first = service.create_post("first", alice, None).await.unwrap();
        service.create_post("reply", bob, Some(first.id)).await.unwrap();
        let second = service.create_post("second", bob, None).await.unwrap();

        let posts = service.list_posts().await.unwrap();
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(posts[1].comments_count, 1);
        assert!(posts.iter().all(|p| p.replies.is_none()));
    }

    #[tokio::test]
    async fn test_create_with_missing_or_deleted_parent() {
        let (service, alice, _) = setup().await;
        let err = service.create_post("orphan", alice, Some(42)).await.unwrap_err();
        assert!(is_post_error(&err, PostError::ParentNotFound(42)));

        let root = service.create_post("root", alice, None).await.unwrap();
        service.create_post("reply", alice, Some(root.id)).await.unwrap();
        service.delete_post(root.id, alice).await.unwrap();

        let err = service.create_post("late", alice, Some(root.id)).await.unwrap_err();
        assert!(is_post_error(&err, PostError::ParentNotFound(root.id)));
    }

    #[tokio::test]
    async fn test_delete_without_replies_removes() {
        let (service, alice, _) = setup().await;
        let post = service.create_post("bye", alice, None).await.unwrap();
        assert_eq!(service.delete_post(post.id, alice).await.unwrap(), DeleteOutcome::Removed);

        let err = service.get_post(post.id).await.unwrap_err();
        assert!(is_post_error(&err, PostError::NotFound(post.id)));
    }

    #[tokio::test]
    async fn test_update_rules() {
        let (service, alice, bob) = setup().await;
        let post = service.create_post("draft", alice, None).await.unwrap();

        let err = service.update_post(post.id, "hijack", bob).await.unwrap_err();
        assert!(is_post_error(&err, PostError::Forbidden));

        let updated = service.update_post(post.id, "final", alice).await.unwrap();
        assert_eq!(updated.content, "final");

        let err = service.update_post(999, "x", alice).await.unwrap_err();
        assert!(is_post_error(&err, PostError::NotFound(999)));

        service.create_post("reply", bob, Some(post.id)).await.unwrap();
        service.delete_post(post.id, alice).await.unwrap();
        let err = service.update_post(post.id, "revive", alice).await.unwrap_err();
        assert!(is_post_error(&err, PostError::AlreadyDeleted));
    }

    #[tokio::test]
    async fn test_non_author_update_of_deleted_post_is_invalid_state() {
        let (service, alice, bob) = setup().await;
        let post = service.create_post("root", alice, None).await.unwrap();
        service.create_post("reply", alice, Some(post.id)).await.unwrap();
        service.delete_post(post.id, alice).await.unwrap();

        let err = service.update_post(post.id, "x", bob).await.unwrap_err();
        assert!(is_post_error(&err, PostError::AlreadyDeleted));
    }

    fn active_record(id: i64, author: UserId) -> PostRecord {
        PostRecord {
            id,
            content: "draft".into(),
            created_at: chrono::Utc::now(),
            user_id: author,
            username: "alice".into(),
            parent_id: None,
            is_deleted: false,
            comments_count: 0,
        }
    }

    #[tokio::test]
    async fn test_update_of_post_removed_mid_request_is_not_found() {
        let author = UserId::new();
        let record = active_record(7, author);

        let mut posts = MockPostRepository::new();
        let mut reads = 0;
        posts.expect_find_post().times(2).returning(move |_| {
            reads += 1;
            Ok((reads == 1).then(|| record.clone()))
        });
        posts.expect_update_content().returning(|_, _| Ok(None));

        let service = PostService::new(Arc::new(posts));
        let err = service.update_post(7, "edit", author).await.unwrap_err();
        assert!(is_post_error(&err, PostError::NotFound(7)));
    }

    #[tokio::test]
    async fn test_update_of_post_tombstoned_mid_request_is_invalid_state() {
        let author = UserId::new();
        let record = active_record(8, author);
        let mut tombstone = record.clone();
        tombstone.is_deleted = true;

        let mut posts = MockPostRepository::new();
        let mut reads = 0;
        posts.expect_find_post().times(2).returning(move |_| {
            reads += 1;
            Ok(Some(if reads == 1 { record.clone() } else { tombstone.clone() }))
        });
        posts.expect_update_content().returning(|_, _| Ok(None));

        let service = PostService::new(Arc::new(posts));
        let err = service.update_post(8, "edit", author).await.unwrap_err();
        assert!(is_post_error(&err, PostError::AlreadyDeleted));
    }

    #[tokio::test]
    async fn test_delete_by_non_author_forbidden() {
        let (service, alice, bob) = setup().await;
        let post = service.create_post("mine", alice, None).await.unwrap();

        let err = service.delete_post(post.id, bob).await.unwrap_err();
        assert!(is_post_error(&err, PostError::Forbidden));
        assert_eq!(service.get_post(post.id).await.unwrap().content, "mine");

        let err = service.delete_post(404, alice).await.unwrap_err();
        assert!(is_post_error(&err, PostError::NotFound(404)));
    }

    #[tokio::test]
    async fn test_delete_falls_back_to_tombstone_when_reply_races_in() {
        let author = UserId::new();
        let record = PostRecord {
            id: 5,
            content: "racy".into(),
            created_at: chrono::Utc::now(),
            user_id: author,
            username: "alice".into(),
            parent_id: None,
            is_deleted: false,
            comments_count: 0,
        };

        let mut posts = MockPostRepository::new();
        posts.expect_find_post().returning(move |_| Ok(Some(record.clone())));
        posts.expect_count_replies().returning(|_| Ok(0));
        posts.expect_remove_post_if_unreplied().returning(|_| Ok(false));
        posts.expect_mark_deleted().times(1).returning(|_| Ok(()));

        let service = PostService::new(Arc::new(posts));
        assert_eq!(service.delete_post(5, author).await.unwrap(), DeleteOutcome::SoftDeleted);
    }
}
