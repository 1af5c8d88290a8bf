//! Response Cache Module
//!
//! Cache-aside storage for rendered responses, keyed by a SHA-256
//! digest of the request line.
//!
//! Only idempotent, read-only handlers may sit behind this cache: a hit skips
//! the handler and all of its side effects. Entries are never invalidated on
//! writes; they age out with their TTL.

mod buffered;
mod key;


use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use tracing::{debug, warn};

use crate::store::CoordinationStore;

pub use buffered::BufferedResponse;
pub use key::cache_key;

// == Response Cache ==
/// Best-effort response cache over the coordination store.
///
/// Store failures never reach the caller: a failed lookup is a miss and a
/// failed write is logged and dropped.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CoordinationStore>,
    ttl: Duration,
}

impl ResponseCache {
    // == Constructor ==
    /// Creates a cache whose entries live for `ttl`.
    pub fn new(store: Arc<dyn CoordinationStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// TTL applied by [`ResponseCache::store`].
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // == Lookup ==
    /// Returns the cached bytes for `key`, or None on a miss.
    pub async fn lookup(&self, key: &str) -> Option<Bytes> {
        match self.store.get(key).await {
            Ok(Some(bytes)) => {
                debug!(key, "response cache hit");
                Some(Bytes::from(bytes))
            }
            Ok(None) => None,
            Err(err) => {
                warn!(key, error = %err, "response cache lookup failed, treating as miss");
                None
            }
        }
    }

    // == Store ==
    /// Writes `body` under `key` with the cache's TTL.
    pub async fn store(&self, key: &str, body: &[u8]) {
        self.store_with_ttl(key, body, self.ttl).await;
    }

    /// Writes `body` under `key` with an explicit TTL. Concurrent writers to
    /// the same key race; the last write wins.
    pub async fn store_with_ttl(&self, key: &str, body: &[u8], ttl: Duration) {
        if let Err(err) = self.store.set(key, body, Some(ttl)).await {
            warn!(key, error = %err, "response cache write failed");
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn cache(ttl: Duration) -> (MemoryStore, ResponseCache) {
        let store = MemoryStore::new();
        let cache = ResponseCache::new(Arc::new(store.clone()), ttl);
        (store, cache)
    }

    #[tokio::test]
    async fn test_store_then_lookup_round_trips_bytes() {
        let (_, cache) = cache(Duration::from_secs(5));
        let body = br#"{"x":1}"#;

        cache.store("cache:abc", body).await;

        assert_eq!(cache.lookup("cache:abc").await.as_deref(), Some(&body[..]));
    }

    #[tokio::test]
    async fn test_repeated_lookup_is_stable_until_ttl() {
        let (_, cache) = cache(Duration::from_millis(100));
        cache.store("cache:abc", b"payload").await;

        let first = cache.lookup("cache:abc").await;
        let second = cache.lookup("cache:abc").await;
        assert_eq!(first, second);
        assert!(first.is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(cache.lookup("cache:abc").await, None);
    }

    #[tokio::test]
    async fn test_five_second_entry_misses_after_six_seconds() {
        let (_, cache) = cache(Duration::from_secs(60));
        cache
            .store_with_ttl("cache:abc", br#"{"x":1}"#, Duration::from_secs(5))
            .await;

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(cache.lookup("cache:abc").await, None);
    }

    #[tokio::test]
    async fn test_explicit_ttl_overrides_default() {
        let (_, cache) = cache(Duration::from_secs(60));
        cache
            .store_with_ttl("cache:short", b"v", Duration::from_millis(40))
            .await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(cache.lookup("cache:short").await, None);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let (_, cache) = cache(Duration::from_secs(5));

        cache.store("cache:k", b"first").await;
        cache.store("cache:k", b"second").await;

        assert_eq!(cache.lookup("cache:k").await.as_deref(), Some(&b"second"[..]));
    }

    #[tokio::test]
    async fn test_store_errors_degrade_to_miss() {
        let (store, cache) = cache(Duration::from_secs(5));
        store.close().await.unwrap();

        cache.store("cache:k", b"ignored").await;

        assert_eq!(cache.lookup("cache:k").await, None);
    }
}
