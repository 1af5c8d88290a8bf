//! Shared application state.

use std::sync::Arc;

use crate::auth::TokenService;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::lock::DistributedLock;
use crate::queue::TaskQueue;
use crate::ratelimit::RateLimiter;
use crate::records::RecordStore;
use crate::store::CoordinationStore;

/// Application state shared across all handlers and pipeline stages.
///
/// Every component talks to the same injected coordination store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn CoordinationStore>,
    pub tokens: TokenService,
    pub rate_limiter: RateLimiter,
    pub response_cache: ResponseCache,
    pub locks: DistributedLock,
    pub tasks: Arc<TaskQueue>,
    pub records: Arc<RecordStore>,
}

impl AppState {
    /// Builds every component from `config` on top of `store`.
    ///
    /// The task queue is created but not started; the caller owns its
    /// lifecycle (see [`TaskQueue::start`] and [`TaskQueue::shutdown`]).
    pub fn new(config: Config, store: Arc<dyn CoordinationStore>) -> Self {
        let tokens = TokenService::new(
            config.jwt_secret.as_bytes(),
            config.jwt_ttl(),
            config.jwt_issuer.clone(),
        );
        let tasks = TaskQueue::new(config.task_queue_buffer, config.task_queue_workers);

        Self {
            tokens,
            rate_limiter: RateLimiter::new(store.clone()),
            response_cache: ResponseCache::new(store.clone(), config.cache_ttl()),
            locks: DistributedLock::new(store.clone()),
            tasks: Arc::new(tasks),
            records: Arc::new(RecordStore::new(config.bcrypt_cost)),
            config: Arc::new(config),
            store,
        }
    }
}
