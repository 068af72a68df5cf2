use crate::data::Repositories;
use crate::domain::comment::{Comment, NewComment};
use crate::domain::error::DomainError;
use tracing::instrument;

#[derive(Clone)]
pub struct CommentService {
    repos: Repositories,
}

impl CommentService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    #[instrument(skip(self, text))]
    pub async fn create_comment(
        &self,
        text: String,
        author_id: i64,
        post_id: i64,
    ) -> Result<Comment, DomainError> {
        self.repos.users.find_by_id(author_id).await?.ok_or_else(|| {
            DomainError::BadRequest(format!("no user with this id = {author_id} was found"))
        })?;
        self.repos.posts.find_by_id(post_id).await?.ok_or_else(|| {
            DomainError::BadRequest(format!("no post with this id = {post_id} was found"))
        })?;

        self.repos
            .comments
            .create(NewComment {
                text,
                author_id,
                post_id,
            })
            .await
    }
}
