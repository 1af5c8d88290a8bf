//! API Module
//!
//! HTTP handlers, shared state and routing for the todo REST API.
//!
//! # Endpoints
//! - `GET /api/v1/health` - Health check endpoint
//! - `POST /api/v1/auth/register`, `POST /api/v1/auth/login` - Tokens
//! - `/api/v1/todos[/:id[/complete]]` - Todo CRUD for the caller

pub mod handlers;
pub mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
