//! Record Store Module
//!
//! In-memory users and todos behind simple create/read/update/delete calls.
//! Handlers reach records only through [`RecordStore`]; every todo lookup
//! is scoped to its owner, so another user's todo reads as not found.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::auth::PasswordHash;
use crate::error::{AppError, Result};
use crate::models::{CreateTodoRequest, Todo, UpdateTodoRequest, User};

// == Record Store ==
#[derive(Debug)]
pub struct RecordStore {
    users: RwLock<HashMap<String, User>>,
    todos: RwLock<HashMap<u64, Todo>>,
    next_user_id: AtomicU64,
    next_todo_id: AtomicU64,
    password_cost: u32,
}

impl RecordStore {
    /// Creates an empty store hashing passwords with bcrypt `password_cost`.
    pub fn new(password_cost: u32) -> Self {
        Self {
            users: RwLock::default(),
            todos: RwLock::default(),
            next_user_id: AtomicU64::new(0),
            next_todo_id: AtomicU64::new(0),
            password_cost,
        }
    }

    // == Users ==
    /// Registers `username`. Fails with Conflict if the name is taken.
    pub async fn create_user(&self, username: &str, password: &str) -> Result<User> {
        if self.users.read().await.contains_key(username) {
            return Err(taken(username));
        }

        let password = password.to_string();
        let cost = self.password_cost;
        let hash = tokio::task::spawn_blocking(move || PasswordHash::generate(&password, cost))
            .await
            .map_err(|err| AppError::Internal(err.to_string()))??;

        // Re-checked under the write lock; a concurrent registration may have won.
        let mut users = self.users.write().await;
        if users.contains_key(username) {
            return Err(taken(username));
        }

        let user = User {
            id: self.next_user_id.fetch_add(1, Ordering::Relaxed) + 1,
            username: username.to_string(),
            password: hash,
            created_at: Utc::now(),
        };
        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    pub async fn find_user(&self, username: &str) -> Option<User> {
        self.users.read().await.get(username).cloned()
    }

    /// Returns the user if `password` matches, None otherwise.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.find_user(username).await else {
            return Ok(None);
        };

        let password = password.to_string();
        tokio::task::spawn_blocking(move || user.password.verify(&password).then_some(user))
            .await
            .map_err(|err| AppError::Internal(err.to_string()))
    }

    // == Todos ==
    pub async fn create_todo(&self, owner_id: &str, req: CreateTodoRequest) -> Todo {
        let now = Utc::now();
        let todo = Todo {
            id: self.next_todo_id.fetch_add(1, Ordering::Relaxed) + 1,
            owner_id: owner_id.to_string(),
            title: req.title,
            description: req.description,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        self.todos.write().await.insert(todo.id, todo.clone());
        todo
    }

    /// Todos of `owner_id`, oldest first.
    pub async fn list_todos(&self, owner_id: &str) -> Vec<Todo> {
        let todos = self.todos.read().await;
        let mut owned: Vec<Todo> = todos
            .values()
            .filter(|todo| todo.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|todo| todo.id);
        owned
    }

    pub async fn get_todo(&self, owner_id: &str, id: u64) -> Result<Todo> {
        self.todos
            .read()
            .await
            .get(&id)
            .filter(|todo| todo.owner_id == owner_id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    pub async fn update_todo(&self, owner_id: &str, id: u64, req: UpdateTodoRequest) -> Result<Todo> {
        self.modify(owner_id, id, |todo| {
            if let Some(title) = req.title {
                todo.title = title;
            }
            if let Some(description) = req.description {
                todo.description = description;
            }
            if let Some(completed) = req.completed {
                todo.completed = completed;
            }
        })
        .await
    }

    /// Marks the todo done. Returns it with `completed` set.
    pub async fn complete_todo(&self, owner_id: &str, id: u64) -> Result<Todo> {
        self.modify(owner_id, id, |todo| todo.completed = true).await
    }

    pub async fn delete_todo(&self, owner_id: &str, id: u64) -> Result<()> {
        let mut todos = self.todos.write().await;
        match todos.get(&id) {
            Some(todo) if todo.owner_id == owner_id => {
                todos.remove(&id);
                Ok(())
            }
            _ => Err(not_found(id)),
        }
    }

    async fn modify<F>(&self, owner_id: &str, id: u64, change: F) -> Result<Todo>
    where
        F: FnOnce(&mut Todo),
    {
        let mut todos = self.todos.write().await;
        let todo = todos
            .get_mut(&id)
            .filter(|todo| todo.owner_id == owner_id)
            .ok_or_else(|| not_found(id))?;

        change(todo);
        todo.updated_at = Utc::now();
        Ok(todo.clone())
    }
}

fn taken(username: &str) -> AppError {
    AppError::Conflict(format!("username {} is taken", username))
}

fn not_found(id: u64) -> AppError {
    AppError::NotFound(format!("todo {}", id))
}
