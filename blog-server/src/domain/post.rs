use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::comment::CommentDetails;
use crate::domain::like::LikeDetails;
use crate::domain::user::Author;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker. Deletion is currently hard, so this stays `None`.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn is_authored_by(&self, user_id: i64) -> bool {
        self.author_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub title: String,
    pub body: String,
}

/// Partial update: `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostChanges {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl PostChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none()
    }
}

/// A post with its author, comments (each with its author) and likes (each with its liker).
#[derive(Debug, Clone, Serialize)]
pub struct PostDetails {
    #[serde(flatten)]
    pub post: Post,
    pub author: Author,
    pub comments: Vec<CommentDetails>,
    pub likes: Vec<LikeDetails>,
}

impl PostDetails {
    pub fn fresh(post: Post, author: Author) -> Self {
        Self {
            post,
            author,
            comments: Vec::new(),
            likes: Vec::new(),
        }
    }

    pub fn liked_by(&self, user_id: i64) -> bool {
        self.likes.iter().any(|l| l.like.user_id == user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostPage {
    pub posts: Vec<PostDetails>,
    pub meta: PageMeta,
}
