use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::data::subscriber_repository::SubscriberRepository;
use crate::domain::error::DomainError;
use crate::domain::subscriber::Subscription;

/// In-memory set of notification recipients, backed by the subscriber store.
pub struct SubscriberRegistry {
    repo: Arc<dyn SubscriberRepository>,
    recipients: RwLock<Vec<i64>>,
}

impl SubscriberRegistry {
    pub fn new(repo: Arc<dyn SubscriberRepository>) -> Self {
        Self {
            repo,
            recipients: RwLock::new(Vec::new()),
        }
    }

    /// Replaces the in-memory set with every stored subscriber.
    pub async fn load(&self) -> Result<usize, DomainError> {
        let stored = self.repo.list_all().await?;
        let mut recipients = self.recipients.write().await;
        recipients.clear();
        for subscriber in stored {
            if !recipients.contains(&subscriber.recipient_id) {
                recipients.push(subscriber.recipient_id);
            }
        }
        info!(count = recipients.len(), "subscribers loaded");
        Ok(recipients.len())
    }

    /// Records a subscription signal. Persists at most one row per recipient.
    ///
    /// The write lock is held across the check and the insert, so concurrent
    /// duplicate signals are applied one after another.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, recipient_id: i64) -> Result<Subscription, DomainError> {
        let mut recipients = self.recipients.write().await;
        if recipients.contains(&recipient_id) {
            return Ok(Subscription::AlreadySubscribed);
        }

        if self.repo.find_by_recipient(recipient_id).await?.is_some() {
            recipients.push(recipient_id);
            return Ok(Subscription::AlreadySubscribed);
        }

        self.repo.create(recipient_id).await?;
        recipients.push(recipient_id);
        info!(recipient_id, "new subscriber");
        Ok(Subscription::Created)
    }

    pub async fn recipients(&self) -> Vec<i64> {
        self.recipients.read().await.clone()
    }
}
