//! Memory Store Module
//!
//! Process-local coordination store. It gives single-process deployments and
//! tests the same semantics as a remote backend: per-key atomicity, TTL
//! expiry, set-if-not-exists and atomic increment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::store::entry::current_timestamp_ms;
use crate::store::{validate, CoordinationStore, StoreEntry};

// == Memory Store ==
/// In-memory coordination store. Cloning shares the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Key-value storage
    entries: Arc<RwLock<HashMap<String, StoreEntry>>>,
    /// Set once `close` has been called
    closed: Arc<AtomicBool>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    // == Purge Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed. Expired entries are already
    /// invisible to readers; purging only reclaims memory.
    pub async fn purge_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    // == Length ==
    /// Returns the number of entries held, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    // == Is Empty ==
    /// Returns true if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Looks up a live entry, dropping it first if it has expired.
fn live_entry<'a>(
    entries: &'a mut HashMap<String, StoreEntry>,
    key: &str,
) -> Option<&'a mut StoreEntry> {
    if entries.get(key).is_some_and(StoreEntry::is_expired) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.ensure_open()?;
        validate(key, None)?;

        let mut entries = self.entries.write().await;
        match live_entry(&mut entries, key) {
            Some(entry) => {
                let current: i64 = std::str::from_utf8(&entry.value)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| StoreError::WrongType(key.to_string()))?;
                let next = current
                    .checked_add(1)
                    .ok_or_else(|| StoreError::WrongType(key.to_string()))?;
                entry.value = next.to_string().into_bytes();
                Ok(next)
            }
            None => {
                entries.insert(key.to_string(), StoreEntry::new(b"1".to_vec(), None));
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.ensure_open()?;
        validate(key, None)?;

        let mut entries = self.entries.write().await;
        match live_entry(&mut entries, key) {
            Some(entry) => {
                entry.set_ttl(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        validate(key, None)?;

        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        self.ensure_open()?;
        validate(key, Some(value))?;

        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), StoreEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool> {
        self.ensure_open()?;
        validate(key, Some(value))?;

        let mut entries = self.entries.write().await;
        if live_entry(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(key.to_string(), StoreEntry::new(value.to_vec(), Some(ttl)));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.ensure_open()?;
        validate(key, None)?;

        let mut entries = self.entries.write().await;
        if live_entry(&mut entries, key).is_none() {
            return Ok(false);
        }
        Ok(entries.remove(key).is_some())
    }

    async fn delete_if_equals(&self, key: &str, expected: &[u8]) -> StoreResult<bool> {
        self.ensure_open()?;
        validate(key, None)?;

        let mut entries = self.entries.write().await;
        let matches = live_entry(&mut entries, key).is_some_and(|entry| entry.value == expected);
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.ensure_open()
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        self.entries.write().await.clear();
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MAX_KEY_LENGTH, MAX_VALUE_SIZE};

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();

        store.set("key1", b"value1", None).await.unwrap();

        assert_eq!(store.get("key1").await.unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites_value_and_ttl() {
        let store = MemoryStore::new();

        store
            .set("key1", b"old", Some(Duration::from_millis(30)))
            .await
            .unwrap();
        store.set("key1", b"new", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(store.get("key1").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let store = MemoryStore::new();

        store
            .set("key1", b"value1", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(store.get("key1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(store.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incr_counts_from_zero() {
        let store = MemoryStore::new();

        assert_eq!(store.incr("counter").await.unwrap(), 1);
        assert_eq!(store.incr("counter").await.unwrap(), 2);
        assert_eq!(store.incr("counter").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_incr_preserves_ttl() {
        let store = MemoryStore::new();

        store.incr("counter").await.unwrap();
        assert!(store
            .expire("counter", Duration::from_millis(50))
            .await
            .unwrap());
        store.incr("counter").await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(store.incr("counter").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incr_on_text_is_wrong_type() {
        let store = MemoryStore::new();
        store.set("text", b"hello", None).await.unwrap();

        let result = store.incr("text").await;
        assert!(matches!(result, Err(StoreError::WrongType(_))));
    }

    #[tokio::test]
    async fn test_expire_missing_key() {
        let store = MemoryStore::new();
        assert!(!store.expire("nope", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_nx_only_creates_once() {
        let store = MemoryStore::new();

        assert!(store.set_nx("lock:a", b"1", Duration::from_secs(10)).await.unwrap());
        assert!(!store.set_nx("lock:a", b"2", Duration::from_secs(10)).await.unwrap());
        assert_eq!(store.get("lock:a").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_set_nx_after_expiry() {
        let store = MemoryStore::new();

        assert!(store
            .set_nx("lock:a", b"1", Duration::from_millis(30))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.set_nx("lock:a", b"2", Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();

        store.set("key1", b"v", None).await.unwrap();

        assert!(store.delete("key1").await.unwrap());
        assert!(!store.delete("key1").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_if_equals() {
        let store = MemoryStore::new();
        store.set("lock:a", b"owner-1", None).await.unwrap();

        assert!(!store.delete_if_equals("lock:a", b"owner-2").await.unwrap());
        assert!(store.get("lock:a").await.unwrap().is_some());

        assert!(store.delete_if_equals("lock:a", b"owner-1").await.unwrap());
        assert!(store.get("lock:a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryStore::new();

        store
            .set("short", b"v", Some(Duration::from_millis(30)))
            .await
            .unwrap();
        store
            .set("long", b"v", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_commands() {
        let store = MemoryStore::new();
        store.close().await.unwrap();

        assert_eq!(store.ping().await, Err(StoreError::Closed));
        assert_eq!(store.incr("k").await, Err(StoreError::Closed));
        assert_eq!(store.get("k").await, Err(StoreError::Closed));
    }

    #[tokio::test]
    async fn test_key_too_long() {
        let store = MemoryStore::new();
        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);

        let result = store.set(&long_key, b"v", None).await;
        assert!(matches!(result, Err(StoreError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_value_too_large() {
        let store = MemoryStore::new();
        let large_value = vec![b'x'; MAX_VALUE_SIZE + 1];

        let result = store.set("key", &large_value, None).await;
        assert!(matches!(result, Err(StoreError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_concurrent_incr_is_atomic() {
        let store = MemoryStore::new();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.incr("shared").await.unwrap() })
            })
            .collect();

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort_unstable();

        assert_eq!(seen, (1..=50).collect::<Vec<i64>>());
    }
}
