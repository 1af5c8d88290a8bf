//! API Routes
//!
//! Configures the Axum router. Routes are split into a public and a
//! protected group, each wrapped in its own [`Pipeline`].

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::handlers::{
    complete_todo_handler, create_todo_handler, delete_todo_handler, get_todo_handler,
    health_handler, list_todos_handler, login_handler, not_found_handler, register_handler,
    update_todo_handler,
};
use super::state::AppState;
use crate::pipeline::Pipeline;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /api/v1/health` - Health check, including store reachability
/// - `POST /api/v1/auth/register` - Create a user, returns a token
/// - `POST /api/v1/auth/login` - Exchange credentials for a token
/// - `GET|POST /api/v1/todos` - List or create the caller's todos
/// - `GET|PUT|DELETE /api/v1/todos/:id` - Read, update or delete one todo
/// - `POST /api/v1/todos/:id/complete` - Mark a todo done under a lock
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Public routes: [`Pipeline::public`]
/// - Todo routes: [`Pipeline::protected`]
/// - Anything else: [`Pipeline::edge`] around a JSON 404
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler));

    let protected = Router::new()
        .route("/todos", get(list_todos_handler).post(create_todo_handler))
        .route(
            "/todos/:id",
            get(get_todo_handler)
                .put(update_todo_handler)
                .delete(delete_todo_handler),
        )
        .route("/todos/:id/complete", post(complete_todo_handler));

    let api = Pipeline::public()
        .apply(public, &state)
        .merge(Pipeline::protected().apply(protected, &state));

    let fallback = Pipeline::edge().apply(Router::new().fallback(not_found_handler), &state);

    Router::new()
        .nest("/api/v1", api)
        .merge(fallback)
        .layer(cors)
        .with_state(state)
}
