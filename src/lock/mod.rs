//! Distributed Lock Module
//!
//! Mutual exclusion across server processes via set-if-not-exists with a TTL.
//!
//! Every successful acquire writes a fresh ownership token under
//! `lock:{name}`. Releasing compares that token before deleting, so a holder
//! whose TTL lapsed can no longer delete a lock someone else has since taken.
//! Acquire never blocks or retries; callers that want to wait poll it.


use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::CoordinationStore;

// == Lock Lease ==
/// Proof of holding a lock. Hand it back to [`DistributedLock::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a lease that is never released holds the lock until its TTL expires"]
pub struct LockLease {
    name: String,
    token: String,
}

impl LockLease {
    /// Lock name without the `lock:` prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ownership token stored under the lock key.
    pub fn token(&self) -> &str {
        &self.token
    }
}

// == Distributed Lock ==
/// Lock manager over a shared coordination store.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn CoordinationStore>,
}

impl DistributedLock {
    // == Constructor ==
    /// Creates a lock manager using `store`.
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    /// Store key backing the lock `name`.
    pub fn lock_key(name: &str) -> String {
        format!("lock:{}", name)
    }

    // == Acquire ==
    /// Tries once to take the lock `name` for at most `ttl`.
    ///
    /// Returns a lease iff this call created the lock key. Contention and
    /// store failures both come back as None; store failures are logged.
    pub async fn acquire(&self, name: &str, ttl: Duration) -> Option<LockLease> {
        let token = Uuid::new_v4().to_string();

        match self
            .store
            .set_nx(&Self::lock_key(name), token.as_bytes(), ttl)
            .await
        {
            Ok(true) => {
                debug!(lock = name, "lock acquired");
                Some(LockLease {
                    name: name.to_string(),
                    token,
                })
            }
            Ok(false) => None,
            Err(err) => {
                warn!(lock = name, error = %err, "lock acquire failed");
                None
            }
        }
    }

    // == Release ==
    /// Releases `lease` if it still owns the lock.
    ///
    /// Returns false when the lock expired and was taken by another holder,
    /// had already expired, or the store could not be reached.
    pub async fn release(&self, lease: LockLease) -> bool {
        match self
            .store
            .delete_if_equals(&Self::lock_key(&lease.name), lease.token.as_bytes())
            .await
        {
            Ok(released) => {
                if !released {
                    warn!(lock = %lease.name, "lock lost before release");
                }
                released
            }
            Err(err) => {
                warn!(lock = %lease.name, error = %err, "lock release failed");
                false
            }
        }
    }

    // == Force Release ==
    /// Deletes the lock `name` regardless of who holds it.
    ///
    /// For operators clearing a stuck lock; normal code releases its lease.
    pub async fn force_release(&self, name: &str) -> bool {
        match self.store.delete(&Self::lock_key(name)).await {
            Ok(deleted) => deleted,
            Err(err) => {
                warn!(lock = name, error = %err, "lock force release failed");
                false
            }
        }
    }

    // == With Lock ==
    /// Runs `work` while holding the lock `name`.
    ///
    /// Returns None without running `work` if the lock is held elsewhere.
    pub async fn with_lock<F, T>(&self, name: &str, ttl: Duration, work: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let lease = self.acquire(name, ttl).await?;
        let output = work.await;
        self.release(lease).await;
        Some(output)
    }
}
