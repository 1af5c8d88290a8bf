//! Store Entry Module
//!
//! A single stored value with an optional expiry deadline.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// == Store Entry ==
/// Represents a single entry held by the in-memory store.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    /// The stored bytes
    pub value: Vec<u8>,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl StoreEntry {
    // == Constructor ==
    /// Creates a new entry with optional TTL.
    pub fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(deadline_after),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches the deadline, so a
    /// fully elapsed TTL is never observable as live.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub(crate) fn is_expired_at(&self, now_ms: u64) -> bool {
        matches!(self.expires_at, Some(expires) if now_ms >= expires)
    }

    /// Replaces the expiry deadline.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.expires_at = Some(deadline_after(ttl));
    }

    // == Time To Live ==
    /// Returns remaining TTL, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at.map(|expires| {
            Duration::from_millis(expires.saturating_sub(current_timestamp_ms()))
        })
    }
}

fn deadline_after(ttl: Duration) -> u64 {
    let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    current_timestamp_ms().saturating_add(ttl_ms)
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
