pub mod app_state;
pub mod auth;
pub mod handlers;
