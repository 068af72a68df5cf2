use crate::application::auth_service::AuthService;
use crate::application::user_service::UserService;
use crate::domain::error::DomainError;
use crate::infrastructure::security::{ACCESS_TOKEN_TTL_SECS, JwtKeys};
use crate::presentation::dto::{AuthResponse, LoginRequest, RegisterRequest, require_non_blank};
use crate::presentation::middleware::JwtAuthMiddleware;
use crate::presentation::utils::AuthenticatedUser;
use actix_web::{HttpResponse, Responder, Scope, get, post, web};
use tracing::info;

pub fn scope(keys: JwtKeys) -> Scope {
    web::scope("/auth")
        .service(register)
        .service(login)
        .service(
            web::scope("/health-check")
                .wrap(JwtAuthMiddleware::new(keys))
                .service(whoami),
        )
}

#[post("/register")]
async fn register(
    service: web::Data<AuthService>,
    payload: web::Json<RegisterRequest>,
) -> Result<impl Responder, DomainError> {
    let RegisterRequest {
        username,
        password,
        bio,
    } = payload.into_inner();
    require_non_blank("username", &username)?;
    require_non_blank("password", &password)?;

    let user = service.register(username, password.clone(), bio).await?;
    info!(user_id = user.id, username = %user.username, "user registered");

    let jwt = service.login(&user.username, &password).await?;

    Ok(HttpResponse::Created().json(AuthResponse {
        access_token: jwt,
        expires_in: ACCESS_TOKEN_TTL_SECS,
        token_type: "Bearer".to_string(),
    }))
}

#[post("/login")]
async fn login(
    service: web::Data<AuthService>,
    payload: web::Json<LoginRequest>,
) -> Result<impl Responder, DomainError> {
    let jwt = service.login(&payload.username, &payload.password).await?;

    info!(username = %payload.username, "user logged in");

    Ok(HttpResponse::Ok().json(AuthResponse {
        access_token: jwt,
        expires_in: ACCESS_TOKEN_TTL_SECS,
        token_type: "Bearer".to_string(),
    }))
}

/// Echoes the profile behind the presented token.
#[get("")]
async fn whoami(
    user: AuthenticatedUser,
    users: web::Data<UserService>,
) -> Result<impl Responder, DomainError> {
    let profile = users.get_profile(user.id).await?;
    Ok(HttpResponse::Ok().json(profile))
}
