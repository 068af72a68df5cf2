use crate::domain::error::DomainError;
use crate::domain::post::PostChanges;
use serde::{Deserialize, Serialize};

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(rename = "token_type")]
    pub token_type: String, // "Bearer"
}

// ======================= POSTS =======================

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl From<UpdatePostRequest> for PostChanges {
    fn from(req: UpdatePostRequest) -> Self {
        Self {
            title: req.title,
            body: req.body,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl ListPostsQuery {
    /// Boundary limits: page ≥ 1, 1 ≤ size ≤ MAX_PAGE_SIZE.
    pub fn clamped(&self) -> (Option<u32>, Option<u32>) {
        (
            self.page.map(|p| p.max(1)),
            self.size.map(|s| s.clamp(1, MAX_PAGE_SIZE)),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct DeletePostResponse {
    pub deleted: bool,
}

// ======================= COMMENTS =======================

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub text: String,
}

// ======================= USERS =======================

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub bio: Option<String>,
}

// ======================= Utils =======================

pub fn require_non_blank(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        Err(DomainError::BadRequest(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}
