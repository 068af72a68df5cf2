use crate::application::post_service::PostService;
use crate::domain::error::DomainError;
use crate::domain::post::PostChanges;
use crate::presentation::dto::{
    CreatePostRequest, DeletePostResponse, ListPostsQuery, UpdatePostRequest, require_non_blank,
};
use crate::presentation::utils::AuthenticatedUser;
use actix_web::{HttpResponse, delete, get, patch, post, web};
use tracing::info;

#[post("")]
async fn create_post(
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    payload: web::Json<CreatePostRequest>,
) -> Result<HttpResponse, DomainError> {
    let CreatePostRequest { title, body } = payload.into_inner();
    require_non_blank("title", &title)?;
    require_non_blank("body", &body)?;

    let created = posts.create_post(user.id, title, body).await?;

    info!(
        username = %user.username,
        post_id = created.post.id,
        "post created"
    );

    Ok(HttpResponse::Created().json(created))
}

#[patch("/{id}")]
async fn update_post(
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    payload: web::Json<UpdatePostRequest>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    let changes: PostChanges = payload.into_inner().into();
    if changes.is_empty() {
        return Err(DomainError::BadRequest("nothing to update".into()));
    }

    posts.update_post(post_id, changes).await?;

    info!(
        username = %user.username,
        post_id,
        "post updated"
    );

    Ok(HttpResponse::NoContent().finish())
}

#[patch("/{id}/like")]
async fn toggle_like(
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    posts.toggle_like(post_id, user.id).await?;
    let refreshed = posts.get_post(post_id).await?;

    info!(
        username = %user.username,
        post_id,
        liked = refreshed.liked_by(user.id),
        "like toggled"
    );

    Ok(HttpResponse::Ok().json(refreshed))
}

#[delete("/{id}")]
async fn delete_post(
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();

    if !posts.delete_post(post_id, user.id).await? {
        return Err(DomainError::Forbidden);
    }

    info!(
        username = %user.username,
        post_id,
        "post deleted"
    );

    Ok(HttpResponse::Ok().json(DeletePostResponse { deleted: true }))
}

#[get("/posts")]
async fn get_posts(
    posts: web::Data<PostService>,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse, DomainError> {
    let (page, size) = query.clamped();
    let result = posts.list_posts(page, size).await?;

    info!(
        page = result.meta.page,
        returned = result.posts.len(),
        "posts retrieved"
    );

    Ok(HttpResponse::Ok().json(result))
}

#[get("/posts/{id}")]
async fn get_post(
    posts: web::Data<PostService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post = posts.get_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}
