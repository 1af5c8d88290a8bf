//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Configuration problems detected at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting {0}: must be greater than zero")]
    Zero(&'static str),

    #[error("invalid setting {0}: must be between {1} and {2}")]
    OutOfRange(&'static str, u64, u64),
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Secret used to sign identity tokens
    pub jwt_secret: String,
    /// Token lifetime in seconds
    pub jwt_ttl_secs: u64,
    /// Issuer claim written to and required on tokens
    pub jwt_issuer: String,
    /// Requests admitted per client per window
    pub rate_limit_requests: u64,
    /// Rate limit window in seconds
    pub rate_limit_window_secs: u64,
    /// Lifetime of cached responses in seconds
    pub cache_ttl_secs: u64,
    /// Per-request deadline in seconds
    pub request_timeout_secs: u64,
    /// TTL of locks taken by handlers, in seconds
    pub lock_ttl_secs: u64,
    /// Pending task capacity of the task queue
    pub task_queue_buffer: usize,
    /// Number of task queue workers
    pub task_queue_workers: usize,
    /// Expired-entry purge interval for the in-memory store, in seconds
    pub cleanup_interval: u64,
    /// Redis URL; None selects the in-memory store
    pub redis_url: Option<String>,
    /// bcrypt cost for stored passwords
    pub bcrypt_cost: u32,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 8080)
    /// - `JWT_SECRET` - Token signing secret (required, see [`Config::validate`])
    /// - `JWT_TTL_SECS` - Token lifetime (default: 3600)
    /// - `JWT_ISSUER` - Token issuer (default: todo_app)
    /// - `RATE_LIMIT_REQUESTS` - Requests per window (default: 100)
    /// - `RATE_LIMIT_WINDOW_SECS` - Window length (default: 1)
    /// - `CACHE_TTL_SECS` - Cached response lifetime (default: 300)
    /// - `REQUEST_TIMEOUT_SECS` - Request deadline (default: 60)
    /// - `LOCK_TTL_SECS` - Handler lock TTL (default: 10)
    /// - `TASK_QUEUE_BUFFER` - Task buffer size (default: 100)
    /// - `TASK_QUEUE_WORKERS` - Worker count (default: 4)
    /// - `CLEANUP_INTERVAL` - Store purge frequency (default: 1)
    /// - `REDIS_URL` - Remote store URL (default: unset, in-memory store)
    /// - `BCRYPT_COST` - Password hashing cost, 4 to 31 (default: 12)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
            jwt_ttl_secs: env_or("JWT_TTL_SECS", defaults.jwt_ttl_secs),
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            rate_limit_requests: env_or("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests),
            rate_limit_window_secs: env_or(
                "RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window_secs,
            ),
            cache_ttl_secs: env_or("CACHE_TTL_SECS", defaults.cache_ttl_secs),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            lock_ttl_secs: env_or("LOCK_TTL_SECS", defaults.lock_ttl_secs),
            task_queue_buffer: env_or("TASK_QUEUE_BUFFER", defaults.task_queue_buffer),
            task_queue_workers: env_or("TASK_QUEUE_WORKERS", defaults.task_queue_workers),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            bcrypt_cost: env_or("BCRYPT_COST", defaults.bcrypt_cost),
        }
    }

    /// Rejects configurations the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        let positive = [
            ("RATE_LIMIT_REQUESTS", self.rate_limit_requests),
            ("RATE_LIMIT_WINDOW_SECS", self.rate_limit_window_secs),
            ("REQUEST_TIMEOUT_SECS", self.request_timeout_secs),
            ("LOCK_TTL_SECS", self.lock_ttl_secs),
            ("TASK_QUEUE_WORKERS", self.task_queue_workers as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(ConfigError::OutOfRange(
                "BCRYPT_COST",
                MIN_BCRYPT_COST.into(),
                MAX_BCRYPT_COST.into(),
            ));
        }
        Ok(())
    }

    pub fn jwt_ttl(&self) -> Duration {
        Duration::from_secs(self.jwt_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8080,
            jwt_secret: String::new(),
            jwt_ttl_secs: 3600,
            jwt_issuer: "todo_app".to_string(),
            rate_limit_requests: 100,
            rate_limit_window_secs: 1,
            cache_ttl_secs: 300,
            request_timeout_secs: 60,
            lock_ttl_secs: 10,
            task_queue_buffer: 100,
            task_queue_workers: 4,
            cleanup_interval: 1,
            redis_url: None,
            bcrypt_cost: crate::auth::PasswordHash::DEFAULT_COST,
        }
    }
}
