pub mod comment_repository;
pub mod like_repository;
#[cfg(test)]
pub mod memory;
pub mod post_repository;
pub mod subscriber_repository;
pub mod user_repository;

use std::sync::Arc;

use sqlx::PgPool;

use comment_repository::{CommentRepository, PostgresCommentRepository};
use like_repository::{LikeRepository, PostgresLikeRepository};
use post_repository::{PostRepository, PostgresPostRepository};
use subscriber_repository::{PostgresSubscriberRepository, SubscriberRepository};
use user_repository::{PostgresUserRepository, UserRepository};

/// Handles to every entity store the services depend on.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub likes: Arc<dyn LikeRepository>,
    pub subscribers: Arc<dyn SubscriberRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            posts: Arc::new(PostgresPostRepository::new(pool.clone())),
            comments: Arc::new(PostgresCommentRepository::new(pool.clone())),
            likes: Arc::new(PostgresLikeRepository::new(pool.clone())),
            subscribers: Arc::new(PostgresSubscriberRepository::new(pool)),
        }
    }
}
