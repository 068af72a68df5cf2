use std::sync::Arc;

use tracing::instrument;

use crate::data::user_repository::UserRepository;
use crate::domain::error::DomainError;
use crate::domain::user::Author;

/// Public user profiles.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    pub async fn get_profile(&self, id: i64) -> Result<Author, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .map(|user| Author::from(&user))
            .ok_or(DomainError::UserNotFound(id))
    }

    /// Replaces the bio of `id`. Only the user themselves may do so; absence
    /// is reported before ownership.
    #[instrument(skip(self, bio))]
    pub async fn update_bio(
        &self,
        id: i64,
        caller_id: i64,
        bio: Option<String>,
    ) -> Result<Author, DomainError> {
        if self.repo.find_by_id(id).await?.is_none() {
            return Err(DomainError::UserNotFound(id));
        }
        if id != caller_id {
            return Err(DomainError::Forbidden);
        }
        self.repo
            .update_bio(id, bio)
            .await?
            .map(|user| Author::from(&user))
            .ok_or(DomainError::UserNotFound(id))
    }
}
