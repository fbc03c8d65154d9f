use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::db::models::{NewPost, PostRecord, User, UserId};
use crate::db::repository::{PostRepository, UserRepository};
use crate::Result;

const USER_COLUMNS: &str =
    "id, username, password_hash, refresh_token, refresh_token_expires_at, created_at";

const POST_SELECT: &str = r#"
    SELECT p.id, p.content, p.created_at, p.user_id, u.username, p.parent_id, p.is_deleted,
           (SELECT COUNT(*) FROM posts r WHERE r.parent_id = p.id) AS comments_count
    FROM posts p
    JOIN users u ON u.id = p.user_id
"#;

/// Postgres-backed store. Every operation is a single statement, so each
/// call is atomic on its own.
#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for DbOperations {
    async fn create_user(&self, user: &User) -> Result<User> {
        let query = format!(
            "INSERT INTO users ({cols}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {cols}",
            cols = USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.refresh_token)
            .bind(user.refresh_token_expires_at)
            .bind(user.created_at)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn store_refresh_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users SET refresh_token = $2, refresh_token_expires_at = $3 WHERE id = $1",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        user_id: UserId,
        current: &str,
        next: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET refresh_token = $3, refresh_token_expires_at = $4
            WHERE id = $1 AND refresh_token = $2
            "#,
        )
        .bind(user_id)
        .bind(current)
        .bind(next)
        .bind(expires_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl PostRepository for DbOperations {
    async fn list_top_level_posts(&self) -> Result<Vec<PostRecord>> {
        let query = format!(
            "{} WHERE p.parent_id IS NULL ORDER BY p.created_at DESC, p.id DESC",
            POST_SELECT
        );
        let posts = sqlx::query_as::<_, PostRecord>(&query)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(posts)
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>> {
        let query = format!("{} WHERE p.id = $1", POST_SELECT);
        let post = sqlx::query_as::<_, PostRecord>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(post)
    }

    async fn list_replies(&self, parent_id: i64) -> Result<Vec<PostRecord>> {
        let query = format!(
            "{} WHERE p.parent_id = $1 ORDER BY p.created_at ASC, p.id ASC",
            POST_SELECT
        );
        let posts = sqlx::query_as::<_, PostRecord>(&query)
            .bind(parent_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(posts)
    }

    async fn active_post_exists(&self, id: i64) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1 AND NOT is_deleted)",
        )
        .bind(id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Option<PostRecord>> {
        // The parent check and the insert are one statement.
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO posts (content, created_at, user_id, parent_id, is_deleted)
            SELECT $1, $2, $3, $4, FALSE
            WHERE $4::BIGINT IS NULL
               OR EXISTS (SELECT 1 FROM posts WHERE id = $4 AND NOT is_deleted)
            RETURNING id
            "#,
        )
        .bind(&post.content)
        .bind(post.created_at)
        .bind(post.user_id)
        .bind(post.parent_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        match id {
            Some(id) => self.find_post(id).await,
            None => Ok(None),
        }
    }

    async fn update_content(&self, id: i64, content: &str) -> Result<Option<PostRecord>> {
        let result = sqlx::query("UPDATE posts SET content = $2 WHERE id = $1 AND NOT is_deleted")
            .bind(id)
            .bind(content)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_post(id).await
    }

    async fn mark_deleted(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE posts SET is_deleted = TRUE WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn remove_post_if_unreplied(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM posts p
            WHERE p.id = $1
              AND NOT EXISTS (SELECT 1 FROM posts r WHERE r.parent_id = p.id)
            "#,
        )
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn count_replies(&self, id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE parent_id = $1")
            .bind(id)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}
