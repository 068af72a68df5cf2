mod application;
mod data;
mod domain;
mod infrastructure;
mod presentation;
mod server;

use std::sync::Arc;

use application::auth_service::AuthService;
use application::comment_service::CommentService;
use application::post_service::PostService;
use application::subscriber_registry::SubscriberRegistry;
use application::user_service::UserService;
use data::Repositories;
use infrastructure::config::AppConfig;
use infrastructure::database::{create_pool, run_migrations};
use infrastructure::logging::init_logging;
use infrastructure::security::JwtKeys;
use infrastructure::telegram::start_notifier;
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let repos = Repositories::postgres(pool);

    let registry = Arc::new(SubscriberRegistry::new(Arc::clone(&repos.subscribers)));
    let notifier = start_notifier(config.telegram_bot_token.as_deref(), registry).await;
    info!(enabled = notifier.is_enabled(), "post notifications");

    let auth_service = AuthService::new(
        Arc::clone(&repos.users),
        JwtKeys::new(config.jwt_secret.clone()),
    );
    let user_service = UserService::new(Arc::clone(&repos.users));
    let post_service = PostService::new(repos.clone(), notifier);
    let comment_service = CommentService::new(repos);

    server::start_http_server(
        config,
        auth_service,
        post_service,
        comment_service,
        user_service,
    )
    .await
}
