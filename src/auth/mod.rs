//! Auth Module
//!
//! Identity tokens and password digests.

mod password;
mod token;

pub use password::PasswordHash;
pub use token::{extract_bearer, Claims, TokenService};
