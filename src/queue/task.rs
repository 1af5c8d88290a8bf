//! Task contract for the worker pool.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

// == Task ==
/// A unit of deferred work.
///
/// `execute` consumes the task, so each task runs at most once. The token is
/// the queue's context; long tasks may watch it, but the queue never
/// interrupts them.
#[async_trait]
pub trait Task: Send + 'static {
    /// Name used in log lines.
    fn name(&self) -> &str {
        "task"
    }

    /// Runs the task.
    async fn execute(self: Box<Self>, ctx: CancellationToken) -> anyhow::Result<()>;
}

/// A task as stored in the queue buffer.
pub type BoxedTask = Box<dyn Task>;

type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

// == Closure Tasks ==
/// A task built from a closure, see [`task_fn`].
pub struct FnTask {
    name: String,
    run: Box<dyn FnOnce(CancellationToken) -> TaskFuture + Send>,
}

/// Wraps an async closure as a [`Task`].
pub fn task_fn<F, Fut>(name: impl Into<String>, f: F) -> FnTask
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnTask {
        name: name.into(),
        run: Box::new(move |ctx| Box::pin(f(ctx))),
    }
}

#[async_trait]
impl Task for FnTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(self: Box<Self>, ctx: CancellationToken) -> anyhow::Result<()> {
        (self.run)(ctx).await
    }
}
