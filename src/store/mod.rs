//! Coordination Store Module
//!
//! The key-value store shared by every server process. Rate limiting, response
//! caching and locking are all built on the atomic primitives declared by
//! [`CoordinationStore`]; nothing above this layer takes a client-side lock.
//!
//! # Key conventions
//! - `ratelimit:<clientKey>` - fixed-window request counters
//! - `cache:<hexDigest>` - cached response bodies
//! - `lock:<name>` - lock ownership tokens

mod entry;
mod memory;
#[cfg(feature = "redis")]
mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

pub use entry::StoreEntry;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

// == Coordination Store ==
/// Remote key-value store with the atomic primitives the pipeline relies on.
///
/// Implementations must be safe to call from many request tasks at once. Every
/// method is atomic per key; there is no ordering between different keys.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Atomically increments the integer at `key` and returns the new value.
    ///
    /// A missing key counts as 0. An existing TTL is preserved.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Sets a TTL on an existing key. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Returns the value at `key`, or None if absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Unconditionally stores `value`, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()>;

    /// Stores `value` only if `key` is absent. Returns true iff this call created it.
    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool>;

    /// Removes `key`. Returns true if something was deleted.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Removes `key` only while it still holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &[u8]) -> StoreResult<bool>;

    /// Round-trips to the backend.
    async fn ping(&self) -> StoreResult<()>;

    /// Releases backend resources. Later calls fail with `StoreError::Closed`.
    async fn close(&self) -> StoreResult<()>;
}

// == Key Validation ==
/// Rejects keys and values the store refuses to hold.
pub(crate) fn validate(key: &str, value: Option<&[u8]>) -> StoreResult<()> {
    use crate::error::StoreError;

    if key.is_empty() {
        return Err(StoreError::InvalidRequest("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(StoreError::InvalidRequest(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    if let Some(value) = value {
        if value.len() > MAX_VALUE_SIZE {
            return Err(StoreError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }
    }
    Ok(())
}
