//! Todo Backend - request pipeline for a todo REST API
//!
//! Token authentication, distributed rate limiting, response caching,
//! distributed locking and a background task pool, all coordinating through
//! one shared key-value store.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod lock;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod ratelimit;
pub mod records;
pub mod store;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use tasks::spawn_cleanup_task;
