use crate::domain::error::DomainError;
use crate::domain::subscriber::Subscriber;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Subscriber>, DomainError>;
    async fn find_by_recipient(&self, recipient_id: i64)
    -> Result<Option<Subscriber>, DomainError>;
    async fn create(&self, recipient_id: i64) -> Result<Subscriber, DomainError>;
}

#[derive(Clone)]
pub struct PostgresSubscriberRepository {
    pool: PgPool,
}

impl PostgresSubscriberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberRepository for PostgresSubscriberRepository {
    async fn list_all(&self) -> Result<Vec<Subscriber>, DomainError> {
        sqlx::query_as::<_, Subscriber>(
            "SELECT id, chat_id AS recipient_id FROM telegram_subscribers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while loading subscribers: {}", e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn find_by_recipient(
        &self,
        recipient_id: i64,
    ) -> Result<Option<Subscriber>, DomainError> {
        sqlx::query_as::<_, Subscriber>(
            "SELECT id, chat_id AS recipient_id FROM telegram_subscribers WHERE chat_id = $1",
        )
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while looking up subscriber {}: {}", recipient_id, e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn create(&self, recipient_id: i64) -> Result<Subscriber, DomainError> {
        let inserted = sqlx::query_as::<_, Subscriber>(
            r#"
            INSERT INTO telegram_subscribers (chat_id)
            VALUES ($1)
            ON CONFLICT (chat_id) DO NOTHING
            RETURNING id, chat_id AS recipient_id
            "#,
        )
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create subscriber {}: {}", recipient_id, e);
            DomainError::Internal(format!("database error: {}", e))
        })?;

        match inserted {
            Some(subscriber) => {
                info!(subscriber_id = subscriber.id, recipient_id, "subscriber created");
                Ok(subscriber)
            }
            None => self.find_by_recipient(recipient_id).await?.ok_or_else(|| {
                DomainError::Internal(format!("subscriber {recipient_id} vanished after conflict"))
            }),
        }
    }
}
