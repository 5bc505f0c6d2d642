pub mod config;
pub mod control_feed;
pub mod live_feed;
pub mod store;
pub mod user_store;
