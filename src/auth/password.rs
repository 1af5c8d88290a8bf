//! Password hashing for the register/login endpoints.
//!
//! bcrypt with a configurable cost. Both calls burn CPU on purpose; async
//! callers run them on the blocking pool.

use std::fmt;

use crate::error::AuthError;

/// bcrypt hash as stored on a user record. Salt and cost are embedded.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Cost used when none is configured.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Hashes `password` under a fresh random salt.
    pub fn generate(password: &str, cost: u32) -> Result<Self, AuthError> {
        bcrypt::hash(password, cost)
            .map(Self)
            .map_err(|err| AuthError::Hashing(err.to_string()))
    }

    /// Checks `password` against this hash. A malformed hash never matches.
    pub fn verify(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.0).unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}
