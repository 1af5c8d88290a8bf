//! API Handlers
//!
//! HTTP request handlers for each endpoint. Protected handlers receive the
//! caller through the [`CurrentUser`] extractor.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

use super::state::AppState;
use crate::error::{AppError, AuthError, Result};
use crate::models::{
    CreateTodoRequest, CredentialsRequest, HealthResponse, Todo, TokenResponse, UpdateTodoRequest,
};
use crate::pipeline::CurrentUser;
use crate::tasks::ActivityTask;

/// Handler for GET /api/v1/health
///
/// Reports 503 when the coordination store does not answer a ping.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = match state.store.ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "store ping failed");
            false
        }
    };

    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(HealthResponse::from_probe(store_ok)))
}

/// Fallback for requests no route matched.
pub async fn not_found_handler() -> AppError {
    AppError::NotFound("route".to_string())
}

/// Handler for POST /api/v1/auth/register
pub async fn register_handler(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<TokenResponse>)> {
    if let Some(error_msg) = req.validate() {
        return Err(AppError::InvalidRequest(error_msg));
    }

    let user = state.records.create_user(&req.username, &req.password).await?;
    info!(user_id = user.id, "user registered");

    Ok((StatusCode::CREATED, Json(token_response(&state, user.id)?)))
}

/// Handler for POST /api/v1/auth/login
pub async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>> {
    let user = state
        .records
        .authenticate(&req.username, &req.password)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    Ok(Json(token_response(&state, user.id)?))
}

fn token_response(state: &AppState, user_id: u64) -> Result<TokenResponse> {
    let token = state.tokens.issue(&user_id.to_string())?;
    Ok(TokenResponse {
        user_id,
        token,
        expires_in: state.tokens.ttl().as_secs(),
    })
}

/// Handler for GET /api/v1/todos
pub async fn list_todos_handler(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Json<Vec<Todo>> {
    Json(state.records.list_todos(&user.id).await)
}

/// Handler for POST /api/v1/todos
pub async fn create_todo_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateTodoRequest>,
) -> (StatusCode, Json<Todo>) {
    let todo = state.records.create_todo(&user.id, req).await;
    (StatusCode::CREATED, Json(todo))
}

/// Handler for GET /api/v1/todos/:id
pub async fn get_todo_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<u64>,
) -> Result<Json<Todo>> {
    Ok(Json(state.records.get_todo(&user.id, id).await?))
}

/// Handler for PUT /api/v1/todos/:id
pub async fn update_todo_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<u64>,
    Json(req): Json<UpdateTodoRequest>,
) -> Result<Json<Todo>> {
    Ok(Json(state.records.update_todo(&user.id, id, req).await?))
}

/// Handler for DELETE /api/v1/todos/:id
pub async fn delete_todo_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<u64>,
) -> Result<StatusCode> {
    state.records.delete_todo(&user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lock name guarding completion of todo `id`.
pub fn todo_lock_name(id: u64) -> String {
    format!("todo:{}", id)
}

/// Handler for POST /api/v1/todos/:id/complete
///
/// Runs under the `todo:{id}` lock; a concurrent completion gets 409. On
/// success an activity task is queued for the caller.
pub async fn complete_todo_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<u64>,
) -> Result<Json<Todo>> {
    let lock_name = todo_lock_name(id);
    let lease = state
        .locks
        .acquire(&lock_name, state.config.lock_ttl())
        .await
        .ok_or_else(|| AppError::Conflict(format!("todo {} is being modified", id)))?;

    let result = state.records.complete_todo(&user.id, id).await;
    state.locks.release(lease).await;
    let todo = result?;

    let task = ActivityTask::completed(state.store.clone(), user.id.clone(), todo.id);
    if let Err(err) = state.tasks.submit(task).await {
        warn!(todo_id = id, error = %err, "activity task dropped");
    }

    Ok(Json(todo))
}
