//! Rate Limiter Module
//!
//! Per-client fixed-window request counters kept in the coordination store.
//!
//! Each request atomically increments `ratelimit:{clientKey}`. The first
//! increment of a window sets the key's TTL to the window length, so the key
//! disappearing is what opens the next window. Requests past the limit are
//! rejected without decrementing.
//!
//! A fixed window can admit up to twice the limit around a window boundary.
//! In exchange it needs one integer per client and a single round trip per
//! request, and admission stays correct across every process sharing the
//! store because all counting happens in the store's atomic increment.


use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::StoreResult;
use crate::store::CoordinationStore;

// == Rate Decision ==
/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Requests counted in the current window, including this one
    pub count: u64,
    /// Configured limit for the window
    pub limit: u64,
}

impl RateDecision {
    /// Requests still admissible in the current window.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.count)
    }
}

// == Rate Limiter ==
/// Fixed-window rate limiter over a shared coordination store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CoordinationStore>,
}

impl RateLimiter {
    // == Constructor ==
    /// Creates a rate limiter using `store` for its counters.
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    /// Store key holding the counter for `client_key`.
    pub fn counter_key(client_key: &str) -> String {
        format!("ratelimit:{}", client_key)
    }

    // == Check ==
    /// Counts one request for `client_key` and reports whether it is admitted.
    ///
    /// A store failure is returned as `Err`; it never turns into an admit or
    /// a reject.
    pub async fn check(
        &self,
        client_key: &str,
        limit: u64,
        window: Duration,
    ) -> StoreResult<RateDecision> {
        let key = Self::counter_key(client_key);
        let count = self.store.incr(&key).await?;

        if count == 1 {
            self.store.expire(&key, window).await?;
        }

        let count = u64::try_from(count).unwrap_or(0);
        let decision = RateDecision {
            allowed: count <= limit,
            count,
            limit,
        };

        if !decision.allowed {
            debug!(client = client_key, count, limit, "rate limit exceeded");
        }

        Ok(decision)
    }

    // == Allow ==
    /// Returns true if this request for `client_key` fits in the current window.
    pub async fn allow(&self, client_key: &str, limit: u64, window: Duration) -> StoreResult<bool> {
        Ok(self.check(client_key, limit, window).await?.allowed)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;

    fn limiter() -> (MemoryStore, RateLimiter) {
        let store = MemoryStore::new();
        let limiter = RateLimiter::new(Arc::new(store.clone()));
        (store, limiter)
    }

    #[tokio::test]
    async fn test_admits_exactly_limit_then_rejects() {
        let (_, limiter) = limiter();
        let window = Duration::from_secs(1);

        for _ in 0..100 {
            assert!(limiter.allow("1.2.3.4", 100, window).await.unwrap());
        }

        let decision = limiter.check("1.2.3.4", 100, window).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.count, 101);
        assert_eq!(decision.remaining(), 0);
    }

    #[tokio::test]
    async fn test_window_reopens_after_expiry() {
        let (_, limiter) = limiter();
        let window = Duration::from_millis(100);

        assert!(limiter.allow("client", 1, window).await.unwrap());
        assert!(!limiter.allow("client", 1, window).await.unwrap());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(limiter.allow("client", 1, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejection_does_not_extend_window() {
        let (_, limiter) = limiter();
        let window = Duration::from_millis(100);

        assert!(limiter.allow("client", 1, window).await.unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!limiter.allow("client", 1, window).await.unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(limiter.allow("client", 1, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_clients_are_counted_separately() {
        let (_, limiter) = limiter();
        let window = Duration::from_secs(1);

        assert!(limiter.allow("a", 1, window).await.unwrap());
        assert!(limiter.allow("b", 1, window).await.unwrap());
        assert!(!limiter.allow("a", 1, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_counter_key_convention() {
        let (store, limiter) = limiter();

        limiter.allow("10.0.0.1", 5, Duration::from_secs(1)).await.unwrap();

        assert_eq!(
            store.get("ratelimit:10.0.0.1").await.unwrap(),
            Some(b"1".to_vec())
        );
    }

    #[tokio::test]
    async fn test_store_error_is_not_a_decision() {
        let (store, limiter) = limiter();
        store.close().await.unwrap();

        let result = limiter.allow("client", 10, Duration::from_secs(1)).await;
        assert_eq!(result, Err(StoreError::Closed));
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_budget() {
        let (_, limiter) = limiter();

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter
                        .allow("burst", 25, Duration::from_secs(5))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 25);
    }
}
