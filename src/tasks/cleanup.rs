//! Store Cleanup Task
//!
//! Background task that periodically removes expired entries from the
//! in-memory store. Reads already skip expired entries; this only bounds
//! memory held by keys nobody touches again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::store::MemoryStore;

/// Spawns a background task that purges expired store entries.
///
/// # Arguments
/// * `store` - Handle to the in-memory store (clones share state)
/// * `cleanup_interval_secs` - Interval in seconds between purges
/// * `ctx` - Cancelling this token ends the task
///
/// # Returns
/// A JoinHandle that completes once `ctx` is cancelled.
pub fn spawn_cleanup_task(
    store: MemoryStore,
    cleanup_interval_secs: u64,
    ctx: CancellationToken,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting store cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let removed = store.purge_expired().await;
            if removed > 0 {
                info!("Store cleanup: removed {} expired entries", removed);
            } else {
                debug!("Store cleanup: no expired entries found");
            }
        }

        info!("Store cleanup task stopped");
    })
}
