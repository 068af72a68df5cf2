use crate::application::auth_service::AuthService;
use crate::application::comment_service::CommentService;
use crate::application::post_service::PostService;
use crate::application::user_service::UserService;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::security::JwtKeys;
use crate::presentation::handlers;
use crate::presentation::middleware::{JwtAuthMiddleware, RequestTracing};
use actix_cors::Cors;
use actix_web::middleware::DefaultHeaders;
use actix_web::{App, HttpResponse, HttpServer, Responder, Scope, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

pub async fn start_http_server(
    config: AppConfig,
    auth_service: AuthService,
    post_service: PostService,
    comment_service: CommentService,
    user_service: UserService,
) -> anyhow::Result<()> {
    let bind_address = (config.host.clone(), config.port);
    info!(host = %bind_address.0, port = bind_address.1, "HTTP server starting");

    HttpServer::new(move || {
        let cors = build_cors(&config);

        App::new()
            .wrap(RequestTracing)
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("Referrer-Policy", "no-referrer"))
                    .add(("Permissions-Policy", "geolocation=()"))
                    .add(("Cross-Origin-Opener-Policy", "same-origin")),
            )
            .wrap(cors)
            .app_data(web::Data::new(post_service.clone()))
            .app_data(web::Data::new(comment_service.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .service(api_scope(auth_service.keys().clone()))
    })
    .bind(bind_address)?
    .run()
    .await
    .map_err(anyhow::Error::new)?;

    Ok(())
}

/// Every `/api` route. Mutating routes sit behind bearer-token authentication.
pub fn api_scope(keys: JwtKeys) -> Scope {
    web::scope("/api")
        .route("/health", web::get().to(health))
        .service(handlers::post::get_posts)
        .service(handlers::post::get_post)
        .service(handlers::user::get_user)
        .service(
            web::scope("/posts")
                .wrap(JwtAuthMiddleware::new(keys.clone()))
                .service(handlers::post::create_post)
                .service(handlers::post::toggle_like)
                .service(handlers::post::update_post)
                .service(handlers::post::delete_post),
        )
        .service(
            web::scope("/comments")
                .wrap(JwtAuthMiddleware::new(keys.clone()))
                .service(handlers::comment::create_comment),
        )
        .service(
            web::scope("/users")
                .wrap(JwtAuthMiddleware::new(keys.clone()))
                .service(handlers::user::update_user),
        )
        .service(handlers::auth::scope(keys))
}

fn build_cors(config: &AppConfig) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE"])
        .allowed_headers(vec![
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::AUTHORIZATION,
        ])
        .supports_credentials()
        .max_age(3600);

    for origin in &config.cors_origins {
        cors = if origin == "*" {
            cors.allow_any_origin()
        } else {
            cors.allowed_origin(origin)
        };
    }

    cors
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::notifier::Notifier;
    use crate::application::subscriber_registry::SubscriberRegistry;
    use crate::data::memory::MemoryStore;
    use actix_web::dev::{Service, ServiceResponse};
    use actix_web::http::StatusCode;
    use actix_web::{Error, test};
    use actix_http::Request;
    use serde_json::{Value, json};

    async fn app(
        store: &MemoryStore,
    ) -> impl Service<Request, Response = ServiceResponse, Error = Error> {
        let repos = store.repositories();
        let registry = Arc::new(SubscriberRegistry::new(repos.subscribers.clone()));
        let notifier = Arc::new(Notifier::disabled(registry));
        let keys = JwtKeys::new("test-secret".into());
        let auth = AuthService::new(repos.users.clone(), keys.clone());
        let users = UserService::new(repos.users.clone());

        test::init_service(
            App::new()
                .app_data(web::Data::new(PostService::new(repos.clone(), notifier)))
                .app_data(web::Data::new(CommentService::new(repos)))
                .app_data(web::Data::new(auth))
                .app_data(web::Data::new(users))
                .service(api_scope(keys)),
        )
        .await
    }

    async fn status<S>(app: &S, req: Request) -> StatusCode
    where
        S: Service<Request, Response = ServiceResponse, Error = Error>,
    {
        match test::try_call_service(app, req).await {
            Ok(res) => res.status(),
            Err(err) => err.as_response_error().status_code(),
        }
    }

    async fn register<S>(app: &S, username: &str) -> String
    where
        S: Service<Request, Response = ServiceResponse, Error = Error>,
    {
        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({ "username": username, "password": "correct horse" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(app, req).await;
        body["access_token"].as_str().unwrap().to_string()
    }

    fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {token}"))
    }

    #[actix_web::test]
    async fn health_is_public() {
        let store = MemoryStore::new();
        let app = app(&store).await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        assert_eq!(status(&app, req).await, StatusCode::OK);
    }

    #[actix_web::test]
    async fn duplicate_registration_conflicts_and_bad_login_is_rejected() {
        let store = MemoryStore::new();
        let app = app(&store).await;
        register(&app, "alice").await;

        let again = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({ "username": "alice", "password": "x" }))
            .to_request();
        assert_eq!(status(&app, again).await, StatusCode::CONFLICT);

        let login = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "username": "alice", "password": "wrong" }))
            .to_request();
        assert_eq!(status(&app, login).await, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn post_lifecycle_over_http() {
        let store = MemoryStore::new();
        let app = app(&store).await;
        let alice = register(&app, "alice").await;
        let bob = register(&app, "bob").await;

        let anonymous = test::TestRequest::post()
            .uri("/api/posts")
            .set_json(json!({ "title": "Hello", "body": "World" }))
            .to_request();
        assert_eq!(status(&app, anonymous).await, StatusCode::UNAUTHORIZED);

        let create = test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(bearer(&alice))
            .set_json(json!({ "title": "Hello", "body": "World" }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, create).await;
        let post_id = created["id"].as_i64().unwrap();
        assert_eq!(created["title"], "Hello");
        assert_eq!(created["author"]["username"], "alice");
        assert_eq!(created["likes"], json!([]));

        let like = || {
            test::TestRequest::patch()
                .uri(&format!("/api/posts/{post_id}/like"))
                .insert_header(bearer(&bob))
                .to_request()
        };
        let liked: Value = test::call_and_read_body_json(&app, like()).await;
        assert_eq!(liked["likes"].as_array().unwrap().len(), 1);
        assert_eq!(liked["likes"][0]["user"]["username"], "bob");
        let unliked: Value = test::call_and_read_body_json(&app, like()).await;
        assert_eq!(unliked["likes"], json!([]));

        let missing_like = test::TestRequest::patch()
            .uri("/api/posts/9999/like")
            .insert_header(bearer(&bob))
            .to_request();
        assert_eq!(status(&app, missing_like).await, StatusCode::NOT_FOUND);

        let comment = test::TestRequest::post()
            .uri(&format!("/api/comments/{post_id}"))
            .insert_header(bearer(&bob))
            .set_json(json!({ "text": "nice" }))
            .to_request();
        assert_eq!(status(&app, comment).await, StatusCode::CREATED);

        let orphan_comment = test::TestRequest::post()
            .uri("/api/comments/9999")
            .insert_header(bearer(&bob))
            .set_json(json!({ "text": "nice" }))
            .to_request();
        assert_eq!(status(&app, orphan_comment).await, StatusCode::BAD_REQUEST);

        let update = test::TestRequest::patch()
            .uri(&format!("/api/posts/{post_id}"))
            .insert_header(bearer(&alice))
            .set_json(json!({ "title": "Hello again" }))
            .to_request();
        assert_eq!(status(&app, update).await, StatusCode::NO_CONTENT);

        let fetch = test::TestRequest::get()
            .uri(&format!("/api/posts/{post_id}"))
            .to_request();
        let fetched: Value = test::call_and_read_body_json(&app, fetch).await;
        assert_eq!(fetched["title"], "Hello again");
        assert_eq!(fetched["body"], "World");
        assert_eq!(fetched["comments"][0]["text"], "nice");

        let list = test::TestRequest::get()
            .uri("/api/posts?page=1&size=5")
            .to_request();
        let listed: Value = test::call_and_read_body_json(&app, list).await;
        assert_eq!(listed["meta"], json!({ "total": 1, "page": 1, "page_size": 5 }));

        let foreign_delete = test::TestRequest::delete()
            .uri(&format!("/api/posts/{post_id}"))
            .insert_header(bearer(&bob))
            .to_request();
        assert_eq!(status(&app, foreign_delete).await, StatusCode::FORBIDDEN);

        let delete = test::TestRequest::delete()
            .uri(&format!("/api/posts/{post_id}"))
            .insert_header(bearer(&alice))
            .to_request();
        assert_eq!(status(&app, delete).await, StatusCode::OK);

        let gone = test::TestRequest::get()
            .uri(&format!("/api/posts/{post_id}"))
            .to_request();
        assert_eq!(status(&app, gone).await, StatusCode::NOT_FOUND);
        assert!(store.comments_on(post_id).is_empty());
    }

    #[actix_web::test]
    async fn whoami_requires_a_valid_token() {
        let store = MemoryStore::new();
        let app = app(&store).await;
        let alice = register(&app, "alice").await;

        let req = test::TestRequest::get()
            .uri("/api/auth/health-check")
            .insert_header(bearer(&alice))
            .to_request();
        let me: Value = test::call_and_read_body_json(&app, req).await;
        assert!(me["id"].is_i64());
        assert_eq!(me["username"], "alice");
        assert!(me.get("password_hash").is_none());

        let anonymous = test::TestRequest::get()
            .uri("/api/auth/health-check")
            .to_request();
        assert_eq!(status(&app, anonymous).await, StatusCode::UNAUTHORIZED);

        let forged = test::TestRequest::get()
            .uri("/api/auth/health-check")
            .insert_header(bearer("invalid-token"))
            .to_request();
        assert_eq!(status(&app, forged).await, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn user_profile_over_http() {
        let store = MemoryStore::new();
        let app = app(&store).await;
        let alice = register(&app, "alice").await;
        let bob = register(&app, "bob").await;

        let me = test::TestRequest::get()
            .uri("/api/auth/health-check")
            .insert_header(bearer(&alice))
            .to_request();
        let me: Value = test::call_and_read_body_json(&app, me).await;
        let alice_id = me["id"].as_i64().unwrap();

        let fetch = test::TestRequest::get()
            .uri(&format!("/api/users/{alice_id}"))
            .to_request();
        let profile: Value = test::call_and_read_body_json(&app, fetch).await;
        assert_eq!(profile["id"], alice_id);
        assert_eq!(profile["bio"], Value::Null);

        let missing = test::TestRequest::get().uri("/api/users/9999").to_request();
        assert_eq!(status(&app, missing).await, StatusCode::NOT_FOUND);

        let anonymous = test::TestRequest::patch()
            .uri(&format!("/api/users/{alice_id}"))
            .set_json(json!({ "bio": "updated" }))
            .to_request();
        assert_eq!(status(&app, anonymous).await, StatusCode::UNAUTHORIZED);

        let missing_patch = test::TestRequest::patch()
            .uri("/api/users/9999")
            .insert_header(bearer(&alice))
            .set_json(json!({ "bio": "updated" }))
            .to_request();
        assert_eq!(status(&app, missing_patch).await, StatusCode::NOT_FOUND);

        let foreign = test::TestRequest::patch()
            .uri(&format!("/api/users/{alice_id}"))
            .insert_header(bearer(&bob))
            .set_json(json!({ "bio": "hijacked" }))
            .to_request();
        assert_eq!(status(&app, foreign).await, StatusCode::FORBIDDEN);

        let update = test::TestRequest::patch()
            .uri(&format!("/api/users/{alice_id}"))
            .insert_header(bearer(&alice))
            .set_json(json!({ "bio": "updated" }))
            .to_request();
        let updated: Value = test::call_and_read_body_json(&app, update).await;
        assert_eq!(updated["bio"], "updated");

        let refetch = test::TestRequest::get()
            .uri(&format!("/api/users/{alice_id}"))
            .to_request();
        let profile: Value = test::call_and_read_body_json(&app, refetch).await;
        assert_eq!(profile["bio"], "updated");
    }
}
