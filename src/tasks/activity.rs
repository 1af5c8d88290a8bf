//! Activity counters maintained off the request path.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::queue::Task;
use crate::store::CoordinationStore;

/// Store key counting todos completed by `subject`.
pub fn activity_key(subject: &str) -> String {
    format!("activity:{}:completed", subject)
}

/// Bumps the completion counter of one user.
pub struct ActivityTask {
    store: Arc<dyn CoordinationStore>,
    subject: String,
    todo_id: u64,
}

impl ActivityTask {
    pub fn completed(store: Arc<dyn CoordinationStore>, subject: impl Into<String>, todo_id: u64) -> Self {
        Self {
            store,
            subject: subject.into(),
            todo_id,
        }
    }
}

#[async_trait]
impl Task for ActivityTask {
    fn name(&self) -> &str {
        "activity"
    }

    async fn execute(self: Box<Self>, _ctx: CancellationToken) -> anyhow::Result<()> {
        let total = self.store.incr(&activity_key(&self.subject)).await?;
        debug!(
            subject = %self.subject,
            todo_id = self.todo_id,
            total,
            "recorded completion"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_execute_increments_counter() {
        let store = MemoryStore::new();
        let shared: Arc<dyn CoordinationStore> = Arc::new(store.clone());

        for id in 0..3 {
            Box::new(ActivityTask::completed(shared.clone(), "7", id))
                .execute(CancellationToken::new())
                .await
                .unwrap();
        }

        assert_eq!(
            store.get("activity:7:completed").await.unwrap(),
            Some(b"3".to_vec())
        );
    }

    #[tokio::test]
    async fn test_execute_reports_store_failure() {
        let store = MemoryStore::new();
        store.close().await.unwrap();

        let task = Box::new(ActivityTask::completed(Arc::new(store), "7", 1));
        assert!(task.execute(CancellationToken::new()).await.is_err());
    }
}
