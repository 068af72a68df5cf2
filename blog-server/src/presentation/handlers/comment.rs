use crate::application::comment_service::CommentService;
use crate::domain::error::DomainError;
use crate::presentation::dto::{CreateCommentRequest, require_non_blank};
use crate::presentation::utils::AuthenticatedUser;
use actix_web::{HttpResponse, post, web};
use tracing::info;

#[post("/{post_id}")]
async fn create_comment(
    user: AuthenticatedUser,
    comments: web::Data<CommentService>,
    path: web::Path<i64>,
    payload: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    let text = payload.into_inner().text;
    require_non_blank("text", &text)?;

    let comment = comments.create_comment(text, user.id, post_id).await?;

    info!(
        username = %user.username,
        post_id,
        comment_id = comment.id,
        "comment created"
    );

    Ok(HttpResponse::Created().json(comment))
}
