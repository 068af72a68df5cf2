use crate::domain::error::DomainError;
use crate::domain::like::Like;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};

#[async_trait]
pub trait LikeRepository: Send + Sync {
    async fn find(&self, user_id: i64, post_id: i64) -> Result<Option<Like>, DomainError>;
    /// Idempotent: an existing like for the pair is returned instead of a duplicate.
    async fn create(&self, user_id: i64, post_id: i64) -> Result<Like, DomainError>;
    async fn delete(&self, id: i64) -> Result<(), DomainError>;
}

#[derive(Clone)]
pub struct PostgresLikeRepository {
    pool: PgPool,
}

impl PostgresLikeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LikeRepository for PostgresLikeRepository {
    async fn find(&self, user_id: i64, post_id: i64) -> Result<Option<Like>, DomainError> {
        sqlx::query_as::<_, Like>(
            "SELECT id, user_id, post_id FROM post_likes WHERE user_id = $1 AND post_id = $2",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while looking up like ({}, {}): {}", user_id, post_id, e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn create(&self, user_id: i64, post_id: i64) -> Result<Like, DomainError> {
        let inserted = sqlx::query_as::<_, Like>(
            r#"
            INSERT INTO post_likes (user_id, post_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, post_id) DO NOTHING
            RETURNING id, user_id, post_id
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create like ({}, {}): {}", user_id, post_id, e);
            DomainError::Internal(format!("database error: {}", e))
        })?;

        match inserted {
            Some(like) => {
                info!(like_id = like.id, user_id, post_id, "like created");
                Ok(like)
            }
            // lost a race against another process; the pair is liked either way
            None => self.find(user_id, post_id).await?.ok_or_else(|| {
                DomainError::Internal(format!("like ({user_id}, {post_id}) vanished after conflict"))
            }),
        }
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM post_likes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("failed to delete like {}: {}", id, e);
                DomainError::Internal(e.to_string())
            })?;

        info!(like_id = id, "like removed");
        Ok(())
    }
}
