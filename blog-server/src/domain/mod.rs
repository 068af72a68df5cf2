pub mod cascade;
pub mod comment;
pub mod error;
pub mod like;
pub mod post;
pub mod subscriber;
pub mod user;
