//! Task Queue Module
//!
//! Bounded-buffer worker pool for deferred work.
//!
//! Producers `submit` boxed tasks into a bounded channel and wait while it is
//! full. A fixed set of workers pull from the channel and run each task once;
//! failures are logged and counted, never retried.
//!
//! # Shutdown
//! - [`TaskQueue::stop`] stops the workers and joins them. No task runs after
//!   it returns, but tasks still buffered are dropped unexecuted.
//! - [`TaskQueue::shutdown`] closes submission first and lets the workers
//!   drain the buffer before they exit.

mod task;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::QueueError;

pub use task::{task_fn, BoxedTask, FnTask, Task};

// == Queue Stats ==
/// Counters describing what the workers have done so far.
#[derive(Debug, Default)]
pub struct QueueStats {
    executed: AtomicU64,
    failed: AtomicU64,
}

impl QueueStats {
    /// Tasks that ran to completion without error.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Tasks that returned an error or panicked.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

// == Task Queue ==
/// Bounded worker pool.
pub struct TaskQueue {
    /// Submission side; None once submission is closed
    sender: StdMutex<Option<mpsc::Sender<BoxedTask>>>,
    /// Shared by all workers
    receiver: Arc<Mutex<mpsc::Receiver<BoxedTask>>>,
    workers: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stop: CancellationToken,
    stats: Arc<QueueStats>,
}

impl TaskQueue {
    // == Constructor ==
    /// Creates a queue holding up to `buffer_size` pending tasks, served by
    /// `workers` workers once started.
    pub fn new(buffer_size: usize, workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));

        Self {
            sender: StdMutex::new(Some(sender)),
            receiver: Arc::new(Mutex::new(receiver)),
            workers: workers.max(1),
            handles: Mutex::new(Vec::new()),
            stop: CancellationToken::new(),
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Worker counters.
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    fn sender(&self) -> Result<mpsc::Sender<BoxedTask>, QueueError> {
        self.sender
            .lock()
            .map_err(|_| QueueError::Closed)?
            .clone()
            .ok_or(QueueError::Closed)
    }

    // == Submit ==
    /// Enqueues `task`, waiting while the buffer is full.
    pub async fn submit<T: Task>(&self, task: T) -> Result<(), QueueError> {
        self.submit_boxed(Box::new(task)).await
    }

    /// Enqueues an already boxed task, waiting while the buffer is full.
    pub async fn submit_boxed(&self, task: BoxedTask) -> Result<(), QueueError> {
        let sender = self.sender()?;
        sender.send(task).await.map_err(|_| QueueError::Closed)
    }

    /// Enqueues `task` without waiting; fails with `Full` if there is no room.
    pub fn try_submit<T: Task>(&self, task: T) -> Result<(), QueueError> {
        let sender = self.sender()?;
        sender.try_send(Box::new(task)).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    // == Start ==
    /// Launches the workers. They exit on [`stop`](Self::stop) or when `ctx`
    /// is cancelled; a running task is never interrupted.
    pub async fn start(&self, ctx: &CancellationToken) {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            warn!("task queue already started");
            return;
        }

        for id in 0..self.workers {
            handles.push(tokio::spawn(worker(
                id,
                self.receiver.clone(),
                self.stop.clone(),
                ctx.clone(),
                self.stats.clone(),
            )));
        }
        info!(workers = self.workers, "task queue started");
    }

    // == Stop ==
    /// Signals the workers to exit and waits for them.
    ///
    /// Tasks left in the buffer are abandoned, and blocked submitters are
    /// released with `QueueError::Closed`.
    pub async fn stop(&self) {
        self.stop.cancel();
        self.join_workers().await;
        self.close_submission();
        self.receiver.lock().await.close();
        info!("task queue stopped");
    }

    // == Shutdown ==
    /// Closes submission, lets the workers drain the buffer, then joins them.
    pub async fn shutdown(&self) {
        self.close_submission();
        self.join_workers().await;
        info!(
            executed = self.stats.executed(),
            failed = self.stats.failed(),
            "task queue drained"
        );
    }

    fn close_submission(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }

    async fn join_workers(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().await);
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "task worker terminated abnormally");
            }
        }
    }
}

// == Worker Loop ==
async fn worker(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<BoxedTask>>>,
    stop: CancellationToken,
    ctx: CancellationToken,
    stats: Arc<QueueStats>,
) {
    debug!(worker = id, "task worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = stop.cancelled() => None,
            _ = ctx.cancelled() => None,
            task = async { receiver.lock().await.recv().await } => task,
        };

        // None: stop, cancellation, or a closed and drained buffer
        let Some(task) = next else { break };
        run_task(id, task, ctx.clone(), &stats).await;
    }

    debug!(worker = id, "task worker exiting");
}

async fn run_task(id: usize, task: BoxedTask, ctx: CancellationToken, stats: &QueueStats) {
    let name = task.name().to_string();

    // Own tokio task so a panic is contained to this one unit of work.
    match tokio::spawn(task.execute(ctx)).await {
        Ok(Ok(())) => {
            stats.executed.fetch_add(1, Ordering::Relaxed);
            debug!(worker = id, task = %name, "task completed");
        }
        Ok(Err(err)) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(worker = id, task = %name, error = %err, "task failed");
        }
        Err(err) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            error!(worker = id, task = %name, error = %err, "task panicked");
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_task(counter: Arc<AtomicUsize>) -> impl Task {
        task_fn("count", move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_all_submitted_tasks_run_once() {
        let queue = TaskQueue::new(100, 4);
        let ctx = CancellationToken::new();
        queue.start(&ctx).await;

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            queue.submit(counting_task(counter.clone())).await.unwrap();
        }
        queue.shutdown().await;

        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(queue.stats().executed(), 50);
    }

    #[tokio::test]
    async fn test_failing_and_panicking_tasks_do_not_kill_workers() {
        let queue = TaskQueue::new(10, 1);
        let ctx = CancellationToken::new();
        queue.start(&ctx).await;

        queue
            .submit(task_fn("fails", |_| async { Err(anyhow::anyhow!("boom")) }))
            .await
            .unwrap();
        queue
            .submit(task_fn("panics", |_| async {
                if true {
                    panic!("kaboom");
                }
                Ok(())
            }))
            .await
            .unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        queue.submit(counting_task(counter.clone())).await.unwrap();
        queue.shutdown().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(queue.stats().failed(), 2);
        assert_eq!(queue.stats().executed(), 1);
    }

    #[tokio::test]
    async fn test_try_submit_reports_full_buffer() {
        // Not started: nothing drains the buffer
        let queue = TaskQueue::new(1, 1);
        let counter = Arc::new(AtomicUsize::new(0));

        queue.try_submit(counting_task(counter.clone())).unwrap();
        assert_eq!(
            queue.try_submit(counting_task(counter.clone())),
            Err(QueueError::Full)
        );
    }

    #[tokio::test]
    async fn test_submit_waits_for_room() {
        let queue = Arc::new(TaskQueue::new(1, 1));
        let counter = Arc::new(AtomicUsize::new(0));
        queue.submit(counting_task(counter.clone())).await.unwrap();

        let blocked = {
            let queue = queue.clone();
            let counter = counter.clone();
            tokio::spawn(async move { queue.submit(counting_task(counter)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished(), "submit should wait on a full buffer");

        let ctx = CancellationToken::new();
        queue.start(&ctx).await;
        blocked.await.unwrap().unwrap();
        queue.shutdown().await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stop_abandons_buffered_tasks() {
        let queue = TaskQueue::new(10, 1);
        let ctx = CancellationToken::new();
        queue.start(&ctx).await;

        // Occupy the only worker until after stop has been signalled
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        queue
            .submit(task_fn("gate", move |_| async move {
                let _ = release_rx.await;
                Ok(())
            }))
            .await
            .unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            queue.submit(counting_task(counter.clone())).await.unwrap();
        }

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let _ = release_tx.send(());
        });
        queue.stop().await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(
            queue.submit(counting_task(counter.clone())).await,
            Err(QueueError::Closed)
        );
    }

    #[tokio::test]
    async fn test_no_task_runs_after_stop_returns() {
        let queue = TaskQueue::new(100, 2);
        let ctx = CancellationToken::new();
        queue.start(&ctx).await;

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = counter.clone();
            queue
                .submit(task_fn("slow", move |_| async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }))
                .await
                .unwrap();
        }

        queue.stop().await;
        let at_stop = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(counter.load(Ordering::SeqCst), at_stop);
        assert!(at_stop < 100);
    }

    #[tokio::test]
    async fn test_context_cancellation_stops_workers() {
        let queue = TaskQueue::new(10, 2);
        let ctx = CancellationToken::new();
        queue.start(&ctx).await;

        ctx.cancel();
        tokio::time::timeout(Duration::from_secs(1), queue.shutdown())
            .await
            .expect("workers should exit after cancellation");
    }

    #[tokio::test]
    async fn test_running_task_finishes_despite_cancellation() {
        let queue = TaskQueue::new(10, 1);
        let ctx = CancellationToken::new();
        queue.start(&ctx).await;

        let finished = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        {
            let finished = finished.clone();
            queue
                .submit(task_fn("long", move |_| async move {
                    let _ = started_tx.send(());
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }))
                .await
                .unwrap();
        }

        started_rx.await.unwrap();
        ctx.cancel();
        queue.shutdown().await;

        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
