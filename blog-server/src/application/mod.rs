pub mod auth_service;
pub mod comment_service;
pub mod locks;
pub mod notifier;
pub mod post_service;
pub mod subscriber_registry;
pub mod user_service;
