use serde::{Deserialize, Serialize};

use crate::domain::user::Author;

/// At most one like exists per `(user_id, post_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Like {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeDetails {
    #[serde(flatten)]
    pub like: Like,
    pub user: Author,
}

/// Outcome of a toggle: the state the `(user, post)` pair was moved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeState {
    Liked,
    Unliked,
}
