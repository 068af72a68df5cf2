use std::sync::Arc;

use crate::application::locks::KeyedLocks;
use crate::application::notifier::Notifier;
use crate::data::Repositories;
use crate::domain::cascade::CascadePlan;
use crate::domain::error::DomainError;
use crate::domain::like::LikeState;
use crate::domain::post::{NewPost, PageMeta, Post, PostChanges, PostDetails, PostPage};
use crate::domain::user::Author;
use tracing::{info, instrument};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Clone)]
pub struct PostService {
    repos: Repositories,
    notifier: Arc<Notifier>,
    like_locks: Arc<KeyedLocks<(i64, i64)>>,
}

impl PostService {
    pub fn new(repos: Repositories, notifier: Arc<Notifier>) -> Self {
        Self {
            repos,
            notifier,
            like_locks: Arc::new(KeyedLocks::new()),
        }
    }

    #[instrument(skip(self, title, body))]
    pub async fn create_post(
        &self,
        author_id: i64,
        title: String,
        body: String,
    ) -> Result<PostDetails, DomainError> {
        let author = self
            .repos
            .users
            .find_by_id(author_id)
            .await?
            .ok_or(DomainError::UserNotFound(author_id))?;

        let post = self
            .repos
            .posts
            .create(NewPost {
                author_id,
                title,
                body,
            })
            .await?;

        self.notifier.notify_post_created(&post).await;

        Ok(PostDetails::fresh(post, Author::from(&author)))
    }

    pub async fn get_post(&self, id: i64) -> Result<PostDetails, DomainError> {
        self.repos
            .posts
            .find_detailed(id)
            .await?
            .ok_or(DomainError::PostNotFound(id))
    }

    /// Newest first. `page` is 1-based; both arguments fall back to defaults.
    pub async fn list_posts(
        &self,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<PostPage, DomainError> {
        let page = page.unwrap_or(DEFAULT_PAGE).max(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let offset = i64::from(page - 1) * i64::from(page_size);

        let (posts, total) = self
            .repos
            .posts
            .list_detailed(i64::from(page_size), offset)
            .await?;

        Ok(PostPage {
            posts,
            meta: PageMeta {
                total,
                page,
                page_size,
            },
        })
    }

    /// Flips the caller's like on a post. The returned post does not carry likes;
    /// re-fetch it to observe the current like set.
    #[instrument(skip(self))]
    pub async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<Post, DomainError> {
        self.repos
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(DomainError::PostNotFound(post_id))?;
        self.repos
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(DomainError::UserNotFound(user_id))?;

        let state = {
            let _guard = self.like_locks.lock((user_id, post_id)).await;
            match self.repos.likes.find(user_id, post_id).await? {
                Some(like) => {
                    self.repos.likes.delete(like.id).await?;
                    LikeState::Unliked
                }
                None => {
                    self.repos.likes.create(user_id, post_id).await?;
                    LikeState::Liked
                }
            }
        };
        info!(post_id, user_id, ?state, "like toggled");

        self.repos
            .posts
            .touch(post_id)
            .await?
            .ok_or(DomainError::PostNotFound(post_id))
    }

    /// Applies a partial update. Authorship is not checked here.
    #[instrument(skip(self))]
    pub async fn update_post(&self, id: i64, changes: PostChanges) -> Result<(), DomainError> {
        self.repos
            .posts
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::BadRequest(format!("no post with this id = {id} was found")))?;

        self.repos.posts.update(id, &changes).await?;
        self.notifier.notify_post_updated(id, &changes).await;
        Ok(())
    }

    /// Deletes a post with its likes and comments. Returns `false`, without
    /// touching anything, when the requester is not the author.
    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: i64, requester_id: i64) -> Result<bool, DomainError> {
        let details = self
            .repos
            .posts
            .find_detailed(id)
            .await?
            .ok_or(DomainError::PostNotFound(id))?;

        if !details.post.is_authored_by(requester_id) {
            info!(post_id = id, requester_id, "delete refused: not the author");
            return Ok(false);
        }

        self.repos
            .posts
            .delete_cascade(&CascadePlan::for_post(&details))
            .await?;
        self.notifier.notify_post_deleted(id).await;
        Ok(true)
    }
}
