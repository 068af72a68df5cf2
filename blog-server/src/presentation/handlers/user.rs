use crate::application::user_service::UserService;
use crate::domain::error::DomainError;
use crate::presentation::dto::UpdateUserRequest;
use crate::presentation::utils::AuthenticatedUser;
use actix_web::{HttpResponse, get, patch, web};
use tracing::info;

#[get("/users/{id}")]
async fn get_user(
    users: web::Data<UserService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let profile = users.get_profile(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

#[patch("/{id}")]
async fn update_user(
    user: AuthenticatedUser,
    users: web::Data<UserService>,
    path: web::Path<i64>,
    payload: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, DomainError> {
    let user_id = path.into_inner();
    let profile = users
        .update_bio(user_id, user.id, payload.into_inner().bio)
        .await?;

    info!(username = %user.username, user_id, "bio updated");

    Ok(HttpResponse::Ok().json(profile))
}
