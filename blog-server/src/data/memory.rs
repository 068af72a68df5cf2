//! In-memory entity store used by the test suites.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::data::Repositories;
use crate::data::comment_repository::CommentRepository;
use crate::data::like_repository::LikeRepository;
use crate::data::post_repository::{PostRepository, assemble_details};
use crate::data::subscriber_repository::SubscriberRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::cascade::{CascadePlan, DeleteStep};
use crate::domain::comment::{Comment, CommentDetails, NewComment};
use crate::domain::error::DomainError;
use crate::domain::like::{Like, LikeDetails};
use crate::domain::post::{NewPost, Post, PostChanges, PostDetails};
use crate::domain::subscriber::Subscriber;
use crate::domain::user::{Author, NewUser, User};

#[derive(Default)]
struct State {
    next_id: i64,
    users: BTreeMap<i64, User>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    likes: BTreeMap<i64, Like>,
    subscribers: BTreeMap<i64, Subscriber>,
    executed_steps: Vec<DeleteStep>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing clock so creation order is observable.
    fn tick(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(self.next_id)
    }

    fn details(&self, posts: Vec<Post>) -> Result<Vec<PostDetails>, DomainError> {
        let authors = self.users.values().map(Author::from).collect();
        let comments = self
            .comments
            .values()
            .map(|c| CommentDetails {
                comment: c.clone(),
                author: Author::from(&self.users[&c.author_id]),
            })
            .collect();
        let likes = self
            .likes
            .values()
            .map(|l| LikeDetails {
                like: l.clone(),
                user: Author::from(&self.users[&l.user_id]),
            })
            .collect();
        assemble_details(posts, authors, comments, likes)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            users: Arc::new(self.clone()),
            posts: Arc::new(self.clone()),
            comments: Arc::new(self.clone()),
            likes: Arc::new(self.clone()),
            subscribers: Arc::new(self.clone()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn seed_user(&self, username: &str) -> User {
        let mut state = self.state();
        let user = User {
            id: state.next_id(),
            username: username.to_string(),
            password_hash: String::new(),
            bio: None,
        };
        state.users.insert(user.id, user.clone());
        user
    }

    pub fn seed_post(&self, author_id: i64, title: &str) -> Post {
        let mut state = self.state();
        let id = state.next_id();
        let now = state.tick();
        let post = Post {
            id,
            title: title.to_string(),
            body: format!("body of {title}"),
            author_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.posts.insert(id, post.clone());
        post
    }

    pub fn seed_comment(&self, author_id: i64, post_id: i64, text: &str) -> Comment {
        let mut state = self.state();
        let comment = Comment {
            id: state.next_id(),
            text: text.to_string(),
            author_id,
            post_id,
        };
        state.comments.insert(comment.id, comment.clone());
        comment
    }

    pub fn seed_like(&self, user_id: i64, post_id: i64) -> Like {
        let mut state = self.state();
        let like = Like {
            id: state.next_id(),
            user_id,
            post_id,
        };
        state.likes.insert(like.id, like.clone());
        like
    }

    pub fn seed_subscriber(&self, recipient_id: i64) -> Subscriber {
        let mut state = self.state();
        let subscriber = Subscriber {
            id: state.next_id(),
            recipient_id,
        };
        state.subscribers.insert(subscriber.id, subscriber.clone());
        subscriber
    }

    pub fn post(&self, id: i64) -> Option<Post> {
        self.state().posts.get(&id).cloned()
    }

    pub fn likes_on(&self, post_id: i64) -> Vec<Like> {
        self.state()
            .likes
            .values()
            .filter(|l| l.post_id == post_id)
            .cloned()
            .collect()
    }

    pub fn comments_on(&self, post_id: i64) -> Vec<Comment> {
        self.state()
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect()
    }

    pub fn subscriber_rows(&self) -> Vec<Subscriber> {
        self.state().subscribers.values().cloned().collect()
    }

    pub fn executed_steps(&self) -> Vec<DeleteStep> {
        self.state().executed_steps.clone()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, DomainError> {
        let mut state = self.state();
        if state.users.values().any(|u| u.username == user.username) {
            return Err(DomainError::UserAlreadyExists(user.username));
        }
        let created = User {
            id: state.next_id(),
            username: user.username,
            password_hash: user.password_hash,
            bio: user.bio,
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DomainError> {
        Ok(self.state().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn update_bio(&self, id: i64, bio: Option<String>) -> Result<Option<User>, DomainError> {
        let mut state = self.state();
        Ok(state.users.get_mut(&id).map(|user| {
            user.bio = bio;
            user.clone()
        }))
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn create(&self, post: NewPost) -> Result<Post, DomainError> {
        let mut state = self.state();
        let id = state.next_id();
        let now = state.tick();
        let created = Post {
            id,
            title: post.title,
            body: post.body,
            author_id: post.author_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.posts.insert(id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, DomainError> {
        Ok(self.state().posts.get(&id).cloned())
    }

    async fn find_detailed(&self, id: i64) -> Result<Option<PostDetails>, DomainError> {
        let state = self.state();
        let Some(post) = state.posts.get(&id).cloned() else {
            return Ok(None);
        };
        Ok(state.details(vec![post])?.pop())
    }

    async fn list_detailed(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PostDetails>, i64), DomainError> {
        let state = self.state();
        let mut posts: Vec<Post> = state.posts.values().cloned().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = posts.len() as i64;
        let page = posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((state.details(page)?, total))
    }

    async fn update(&self, id: i64, changes: &PostChanges) -> Result<(), DomainError> {
        let mut state = self.state();
        let now = state.tick();
        if let Some(post) = state.posts.get_mut(&id) {
            if let Some(title) = &changes.title {
                post.title = title.clone();
            }
            if let Some(body) = &changes.body {
                post.body = body.clone();
            }
            post.updated_at = now;
        }
        Ok(())
    }

    async fn touch(&self, id: i64) -> Result<Option<Post>, DomainError> {
        let mut state = self.state();
        let now = state.tick();
        Ok(state.posts.get_mut(&id).map(|post| {
            post.updated_at = now;
            post.clone()
        }))
    }

    async fn delete_cascade(&self, plan: &CascadePlan) -> Result<(), DomainError> {
        let mut state = self.state();
        for step in plan.steps() {
            match &step {
                DeleteStep::Likes(ids) => ids.iter().for_each(|id| {
                    state.likes.remove(id);
                }),
                DeleteStep::Comments(ids) => ids.iter().for_each(|id| {
                    state.comments.remove(id);
                }),
                DeleteStep::Post(id) => {
                    state.posts.remove(id);
                }
            }
            state.executed_steps.push(step);
        }
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn create(&self, comment: NewComment) -> Result<Comment, DomainError> {
        let mut state = self.state();
        let created = Comment {
            id: state.next_id(),
            text: comment.text,
            author_id: comment.author_id,
            post_id: comment.post_id,
        };
        state.comments.insert(created.id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl LikeRepository for MemoryStore {
    async fn find(&self, user_id: i64, post_id: i64) -> Result<Option<Like>, DomainError> {
        Ok(self
            .state()
            .likes
            .values()
            .find(|l| l.user_id == user_id && l.post_id == post_id)
            .cloned())
    }

    async fn create(&self, user_id: i64, post_id: i64) -> Result<Like, DomainError> {
        let mut state = self.state();
        if let Some(existing) = state
            .likes
            .values()
            .find(|l| l.user_id == user_id && l.post_id == post_id)
        {
            return Ok(existing.clone());
        }
        let like = Like {
            id: state.next_id(),
            user_id,
            post_id,
        };
        state.likes.insert(like.id, like.clone());
        Ok(like)
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        self.state().likes.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl SubscriberRepository for MemoryStore {
    async fn list_all(&self) -> Result<Vec<Subscriber>, DomainError> {
        Ok(self.subscriber_rows())
    }

    async fn find_by_recipient(
        &self,
        recipient_id: i64,
    ) -> Result<Option<Subscriber>, DomainError> {
        Ok(self
            .state()
            .subscribers
            .values()
            .find(|s| s.recipient_id == recipient_id)
            .cloned())
    }

    async fn create(&self, recipient_id: i64) -> Result<Subscriber, DomainError> {
        let mut state = self.state();
        if let Some(existing) = state
            .subscribers
            .values()
            .find(|s| s.recipient_id == recipient_id)
        {
            return Ok(existing.clone());
        }
        let subscriber = Subscriber {
            id: state.next_id(),
            recipient_id,
        };
        state.subscribers.insert(subscriber.id, subscriber.clone());
        Ok(subscriber)
    }
}
