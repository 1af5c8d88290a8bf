//! Redis Store Module
//!
//! Coordination store backed by a Redis server. Every call maps onto a single
//! Redis command (or one Lua script), so atomicity is whatever Redis gives
//! per command.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, ErrorKind, RedisError, Script};

use crate::error::{StoreError, StoreResult};
use crate::store::{validate, CoordinationStore};

/// Deletes KEYS[1] only while it holds ARGV[1].
const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

// == Redis Store ==
/// Redis-backed coordination store sharing one multiplexed connection.
pub struct RedisStore {
    connection: MultiplexedConnection,
    compare_and_delete: Script,
    closed: AtomicBool,
}

impl RedisStore {
    // == Constructor ==
    /// Connects to `url` (e.g. `redis://127.0.0.1:6379/0`) and verifies the
    /// connection with a PING.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::open(url).map_err(map_error)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_error)?;

        let store = Self {
            connection,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
            closed: AtomicBool::new(false),
        };
        store.ping().await?;
        Ok(store)
    }

    fn connection(&self) -> StoreResult<MultiplexedConnection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(self.connection.clone())
    }
}

fn map_error(err: RedisError) -> StoreError {
    if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
        StoreError::Unavailable(err.to_string())
    } else if is_wrong_type(&err) {
        StoreError::WrongType(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

/// INCR on text comes back as a plain `ERR value is not an integer`, while
/// commands on the wrong structure use the `WRONGTYPE` code.
fn is_wrong_type(err: &RedisError) -> bool {
    match err.kind() {
        ErrorKind::TypeError => true,
        ErrorKind::ResponseError => err
            .detail()
            .is_some_and(|detail| detail.contains("not an integer")),
        _ => err.code() == Some("WRONGTYPE"),
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        validate(key, None)?;
        let mut conn = self.connection()?;
        conn.incr(key, 1i64).await.map_err(map_error)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        validate(key, None)?;
        let mut conn = self.connection()?;
        let updated: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(map_error)?;
        Ok(updated == 1)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate(key, None)?;
        let mut conn = self.connection()?;
        conn.get(key).await.map_err(map_error)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        validate(key, Some(value))?;
        let mut conn = self.connection()?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let _: () = cmd.query_async(&mut conn).await.map_err(map_error)?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool> {
        validate(key, Some(value))?;
        let mut conn = self.connection()?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(map_error)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        validate(key, None)?;
        let mut conn = self.connection()?;
        let removed: i64 = conn.del(key).await.map_err(map_error)?;
        Ok(removed > 0)
    }

    async fn delete_if_equals(&self, key: &str, expected: &[u8]) -> StoreResult<bool> {
        validate(key, None)?;
        let mut conn = self.connection()?;
        let removed: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(map_error)?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection()?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        // The multiplexed connection shuts down once the last clone drops.
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
