//! Request and Response models for the todo API
//!
//! This module defines the records kept by the record store and the DTOs
//! (Data Transfer Objects) used for serializing/deserializing HTTP bodies.

pub mod records;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use records::{Todo, User};
pub use requests::{CreateTodoRequest, CredentialsRequest, UpdateTodoRequest};
pub use responses::{ErrorResponse, HealthResponse, TokenResponse};
