use crate::domain::error::DomainError;
use crate::domain::user::{NewUser, User};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, DomainError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DomainError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DomainError>;
    /// Replaces the bio. `None` when no such user exists.
    async fn update_bio(&self, id: i64, bio: Option<String>) -> Result<Option<User>, DomainError>;
}

#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, DomainError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, bio)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash, bio
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create user: {}", e);
            if e.as_database_error()
                .and_then(|db| db.constraint())
                .map(|c| c.contains("users_username"))
                == Some(true)
            {
                DomainError::UserAlreadyExists(user.username.clone())
            } else {
                DomainError::Internal(format!("database error: {}", e))
            }
        })?;

        info!(user_id = created.id, username = %created.username, "user created");
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DomainError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, bio
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to find user by id {}: {}", id, e);
            DomainError::Internal(format!("database error: {}", e))
        })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, bio
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to find user by username {}: {}", username, e);
            DomainError::Internal(format!("database error: {}", e))
        })
    }

    async fn update_bio(&self, id: i64, bio: Option<String>) -> Result<Option<User>, DomainError> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET bio = $2
            WHERE id = $1
            RETURNING id, username, password_hash, bio
            "#,
        )
        .bind(id)
        .bind(&bio)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to update bio of user {}: {}", id, e);
            DomainError::Internal(format!("database error: {}", e))
        })?;

        if let Some(user) = &updated {
            info!(user_id = user.id, "user bio updated");
        }
        Ok(updated)
    }
}
