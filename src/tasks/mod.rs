//! Background Tasks Module
//!
//! Work that runs outside the request path.
//!
//! # Tasks
//! - Store cleanup: purges expired entries from the in-memory store
//! - Activity: per-user counters updated from the task queue

mod activity;
mod cleanup;

pub use activity::{activity_key, ActivityTask};
pub use cleanup::spawn_cleanup_task;
