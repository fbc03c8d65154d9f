use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::posts::PostStatus;

/// Opaque identity of a registered user. Ownership checks compare these by value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            id: UserId::new(),
            username,
            password_hash,
            refresh_token: None,
            refresh_token_expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// True when `presented` is the single stored refresh token and it has not expired.
    pub fn refresh_token_valid(&self, presented: &str, now: DateTime<Utc>) -> bool {
        match (&self.refresh_token, self.refresh_token_expires_at) {
            (Some(stored), Some(expires_at)) => stored == presented && expires_at > now,
            _ => false,
        }
    }
}

/// A post row joined with its author's username and its direct reply count.
#[derive(Debug, Clone, FromRow)]
pub struct PostRecord {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    pub username: String,
    pub parent_id: Option<i64>,
    pub is_deleted: bool,
    pub comments_count: i64,
}

impl PostRecord {
    pub fn status(&self) -> PostStatus {
        PostStatus::from_flag(self.is_deleted)
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub content: String,
    pub user_id: UserId,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl NewPost {
    pub fn new(content: String, user_id: UserId, parent_id: Option<i64>) -> Self {
        Self {
            content,
            user_id,
            parent_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_refresh_token_valid() {
        let now = Utc::now();
        let mut user = User::new("alice".into(), "hash".into());
        assert!(!user.refresh_token_valid("anything", now));

        user.refresh_token = Some("abc".into());
        user.refresh_token_expires_at = Some(now + Duration::days(7));
        assert!(user.refresh_token_valid("abc", now));
        assert!(!user.refresh_token_valid("abd", now));

        user.refresh_token_expires_at = Some(now);
        assert!(!user.refresh_token_valid("abc", now), "expiry instant is already expired");
    }

    #[test]
    fn test_user_id_round_trips_through_string() {
        let id = UserId::new();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }
}
