use std::collections::HashMap;

use crate::domain::cascade::{CascadePlan, DeleteStep};
use crate::domain::comment::{Comment, CommentDetails};
use crate::domain::error::DomainError;
use crate::domain::like::{Like, LikeDetails};
use crate::domain::post::{NewPost, Post, PostChanges, PostDetails};
use crate::domain::user::Author;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: NewPost) -> Result<Post, DomainError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, DomainError>;
    async fn find_detailed(&self, id: i64) -> Result<Option<PostDetails>, DomainError>;
    /// Newest first. Returns the requested slice and the total number of posts.
    async fn list_detailed(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PostDetails>, i64), DomainError>;
    async fn update(&self, id: i64, changes: &PostChanges) -> Result<(), DomainError>;
    /// Re-persists the post without changing its content.
    async fn touch(&self, id: i64) -> Result<Option<Post>, DomainError>;
    /// Executes every step of the plan, in order, as one unit.
    async fn delete_cascade(&self, plan: &CascadePlan) -> Result<(), DomainError>;
}

/// Joins posts with their relations. Comments and likes keep their input order.
pub(crate) fn assemble_details(
    posts: Vec<Post>,
    authors: Vec<Author>,
    comments: Vec<CommentDetails>,
    likes: Vec<LikeDetails>,
) -> Result<Vec<PostDetails>, DomainError> {
    let authors: HashMap<i64, Author> = authors.into_iter().map(|a| (a.id, a)).collect();
    let mut comments_by_post: HashMap<i64, Vec<CommentDetails>> = HashMap::new();
    for comment in comments {
        comments_by_post
            .entry(comment.comment.post_id)
            .or_default()
            .push(comment);
    }
    let mut likes_by_post: HashMap<i64, Vec<LikeDetails>> = HashMap::new();
    for like in likes {
        likes_by_post.entry(like.like.post_id).or_default().push(like);
    }

    posts
        .into_iter()
        .map(|post| {
            let author = authors.get(&post.author_id).cloned().ok_or_else(|| {
                DomainError::Internal(format!("author {} of post {} is missing", post.author_id, post.id))
            })?;
            Ok(PostDetails {
                comments: comments_by_post.remove(&post.id).unwrap_or_default(),
                likes: likes_by_post.remove(&post.id).unwrap_or_default(),
                author,
                post,
            })
        })
        .collect()
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    text: String,
    author_id: i64,
    post_id: i64,
    username: String,
    bio: Option<String>,
}

impl From<CommentRow> for CommentDetails {
    fn from(row: CommentRow) -> Self {
        Self {
            author: Author {
                id: row.author_id,
                username: row.username,
                bio: row.bio,
            },
            comment: Comment {
                id: row.id,
                text: row.text,
                author_id: row.author_id,
                post_id: row.post_id,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct LikeRow {
    id: i64,
    user_id: i64,
    post_id: i64,
    username: String,
    bio: Option<String>,
}

impl From<LikeRow> for LikeDetails {
    fn from(row: LikeRow) -> Self {
        Self {
            user: Author {
                id: row.user_id,
                username: row.username,
                bio: row.bio,
            },
            like: Like {
                id: row.id,
                user_id: row.user_id,
                post_id: row.post_id,
            },
        }
    }
}

#[derive(Clone)]
pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn expand(&self, posts: Vec<Post>) -> Result<Vec<PostDetails>, DomainError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let author_ids: Vec<i64> = posts.iter().map(|p| p.author_id).collect();

        let authors = sqlx::query_as::<_, Author>(
            "SELECT id, username, bio FROM users WHERE id = ANY($1)",
        )
        .bind(&author_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while loading post authors: {}", e);
            DomainError::Internal(e.to_string())
        })?;

        let comments = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id, c.text, c.author_id, c.post_id, u.username, u.bio
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = ANY($1)
            ORDER BY c.id
            "#,
        )
        .bind(&post_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while loading comments: {}", e);
            DomainError::Internal(e.to_string())
        })?;

        let likes = sqlx::query_as::<_, LikeRow>(
            r#"
            SELECT l.id, l.user_id, l.post_id, u.username, u.bio
            FROM post_likes l
            JOIN users u ON u.id = l.user_id
            WHERE l.post_id = ANY($1)
            ORDER BY l.id
            "#,
        )
        .bind(&post_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while loading likes: {}", e);
            DomainError::Internal(e.to_string())
        })?;

        assemble_details(
            posts,
            authors,
            comments.into_iter().map(CommentDetails::from).collect(),
            likes.into_iter().map(LikeDetails::from).collect(),
        )
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, post: NewPost) -> Result<Post, DomainError> {
        let created = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (title, body, author_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, body, author_id, created_at, updated_at, deleted_at
            "#,
        )
        .bind(&post.title)
        .bind(&post.body)
        .bind(post.author_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create post: {}", e);
            DomainError::Internal(format!("database error: {}", e))
        })?;

        info!(post_id = created.id, author_id = created.author_id, "post created");
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, DomainError> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, body, author_id, created_at, updated_at, deleted_at
            FROM posts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("db error find_by_id {}: {}", id, e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn find_detailed(&self, id: i64) -> Result<Option<PostDetails>, DomainError> {
        let Some(post) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        Ok(self.expand(vec![post]).await?.pop())
    }

    async fn list_detailed(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PostDetails>, i64), DomainError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, body, author_id, created_at, updated_at, deleted_at
            FROM posts
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while fetching posts: {}", e);
            DomainError::Internal(e.to_string())
        })?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("db error while counting posts: {}", e);
                DomainError::Internal(e.to_string())
            })?;

        Ok((self.expand(posts).await?, total))
    }

    async fn update(&self, id: i64, changes: &PostChanges) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE posts
            SET
                title = COALESCE($1, title),
                body = COALESCE($2, body),
                updated_at = now()
            WHERE id = $3
            "#,
        )
        .bind(&changes.title)
        .bind(&changes.body)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to update post {}: {}", id, e);
            DomainError::Internal(e.to_string())
        })?;

        info!(post_id = id, "post updated");
        Ok(())
    }

    async fn touch(&self, id: i64) -> Result<Option<Post>, DomainError> {
        sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts SET updated_at = now()
            WHERE id = $1
            RETURNING id, title, body, author_id, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to touch post {}: {}", id, e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn delete_cascade(&self, plan: &CascadePlan) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("failed to open transaction for post {}: {}", plan.post_id, e);
            DomainError::Internal(e.to_string())
        })?;

        for step in plan.steps() {
            let result = match &step {
                DeleteStep::Likes(ids) => {
                    sqlx::query("DELETE FROM post_likes WHERE id = ANY($1)")
                        .bind(ids)
                        .execute(&mut *tx)
                        .await
                }
                DeleteStep::Comments(ids) => {
                    sqlx::query("DELETE FROM comments WHERE id = ANY($1)")
                        .bind(ids)
                        .execute(&mut *tx)
                        .await
                }
                DeleteStep::Post(id) => {
                    sqlx::query("DELETE FROM posts WHERE id = $1")
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                }
            };
            result.map_err(|e| {
                error!(post_id = plan.post_id, ?step, "cascade delete step failed: {}", e);
                DomainError::Internal(e.to_string())
            })?;
        }

        tx.commit().await.map_err(|e| {
            error!("failed to commit deletion of post {}: {}", plan.post_id, e);
            DomainError::Internal(e.to_string())
        })?;

        info!(
            post_id = plan.post_id,
            likes = plan.like_ids.len(),
            comments = plan.comment_ids.len(),
            "post deleted"
        );
        Ok(())
    }
}
