//! Records held by the record store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::PasswordHash;

/// A registered user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password: PasswordHash,
    pub created_at: DateTime<Utc>,
}

/// A todo item owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Todo {
    pub id: u64,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
