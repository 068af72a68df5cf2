use crate::domain::post::PostDetails;

/// One step of a cascading post deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteStep {
    Likes(Vec<i64>),
    Comments(Vec<i64>),
    Post(i64),
}

/// Explicit deletion plan for a post and its children.
///
/// Children go first so that no like or comment ever references a missing post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadePlan {
    pub post_id: i64,
    pub like_ids: Vec<i64>,
    pub comment_ids: Vec<i64>,
}

impl CascadePlan {
    pub fn for_post(details: &PostDetails) -> Self {
        Self {
            post_id: details.post.id,
            like_ids: details.likes.iter().map(|l| l.like.id).collect(),
            comment_ids: details.comments.iter().map(|c| c.comment.id).collect(),
        }
    }

    pub fn steps(&self) -> Vec<DeleteStep> {
        vec![
            DeleteStep::Likes(self.like_ids.clone()),
            DeleteStep::Comments(self.comment_ids.clone()),
            DeleteStep::Post(self.post_id),
        ]
    }
}
