pub mod evaluator;
pub mod pipeline;
pub mod reconciler;
pub mod user_repository;
pub mod user_service;
