//! Fixed-size worker pool with rate-limited admission
//!
//! Tasks go through a bounded queue sized to the pool, so a producer that
//! outpaces the workers blocks in [`WorkerScheduler::submit`]. Every task waits
//! for a [`RateLimiter`] admission before its body runs. The first task error
//! is kept in a write-once slot; later errors are logged and dropped while the
//! remaining tasks run to completion.

use futures_util::future::join_all;
use once_cell::sync::OnceCell;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::rate_limit::RateLimiter;
use crate::config::ConfigError;
use crate::shutdown::SharedShutdown;

/// A unit of work owned by the scheduler once submitted
pub type Task<E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send + 'static>>;

type SharedReceiver<E> = Arc<Mutex<mpsc::Receiver<Task<E>>>>;

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError<E>
where
    E: std::error::Error + 'static,
{
    /// Shutdown requested before the queue drained
    #[error("cancelled before all submitted tasks finished")]
    Cancelled,

    /// Every worker has exited, nothing can accept the task
    #[error("worker queue is closed")]
    QueueClosed,

    /// A worker task panicked
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    /// First error returned by a task
    #[error(transparent)]
    Task(E),
}

/// Bounded-concurrency, rate-limited task scheduler
pub struct WorkerScheduler<E> {
    sender: mpsc::Sender<Task<E>>,
    workers: Vec<JoinHandle<()>>,
    first_error: Arc<OnceCell<E>>,
    completed: Arc<AtomicUsize>,
    submitted: AtomicUsize,
    shutdown: SharedShutdown,
}

impl<E> WorkerScheduler<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Start `pool_size` workers sharing one limiter of `rate_per_second`
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        pool_size: usize,
        rate_per_second: usize,
        shutdown: SharedShutdown,
    ) -> Result<Self, ConfigError> {
        if pool_size == 0 {
            return Err(ConfigError::InvalidPoolSize(pool_size));
        }
        let rate_limiter = RateLimiter::per_second(rate_per_second)?;
        Ok(Self::with_rate_limiter(pool_size, rate_limiter, shutdown))
    }

    /// Start `pool_size` workers sharing the given limiter
    pub fn with_rate_limiter(
        pool_size: usize,
        rate_limiter: RateLimiter,
        shutdown: SharedShutdown,
    ) -> Self {
        let pool_size = pool_size.max(1);
        let (sender, receiver) = mpsc::channel(pool_size);
        let receiver: SharedReceiver<E> = Arc::new(Mutex::new(receiver));
        let first_error = Arc::new(OnceCell::new());
        let completed = Arc::new(AtomicUsize::new(0));

        let workers = (0..pool_size)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    receiver.clone(),
                    rate_limiter.clone(),
                    first_error.clone(),
                    completed.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();

        debug!(
            pool_size,
            rate_per_second = rate_limiter.max_requests(),
            "Worker scheduler started"
        );

        Self {
            sender,
            workers,
            first_error,
            completed,
            submitted: AtomicUsize::new(0),
            shutdown,
        }
    }

    /// Number of workers
    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }

    /// Tasks accepted so far
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Whether a task has already failed
    pub fn has_failed(&self) -> bool {
        self.first_error.get().is_some()
    }

    /// Queue a task, waiting while the queue is full
    ///
    /// Submissions are still accepted after a task failure. Once shutdown is
    /// requested the task is rejected with [`SchedulerError::Cancelled`].
    pub async fn submit<F>(&self, task: F) -> Result<(), SchedulerError<E>>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::Cancelled);
        }

        let task: Task<E> = Box::pin(task);
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(SchedulerError::Cancelled),
            sent = self.sender.send(task) => {
                sent.map_err(|_| SchedulerError::QueueClosed)?;
                self.submitted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    /// Close the queue and wait for the workers to drain it
    ///
    /// Returns the first task error if any task failed, or
    /// [`SchedulerError::Cancelled`] if shutdown was requested before every
    /// submitted task ran. On cancellation the call returns without waiting
    /// for tasks that are still running.
    pub async fn wait_until_finish(self) -> Result<(), SchedulerError<E>> {
        let Self {
            sender,
            workers,
            first_error,
            completed,
            submitted,
            shutdown,
            ..
        } = self;
        drop(sender);

        let submitted = submitted.into_inner();
        tokio::select! {
            biased;
            results = join_all(workers) => {
                for result in results {
                    if let Err(e) = result {
                        if e.is_panic() {
                            return Err(SchedulerError::WorkerPanicked(e.to_string()));
                        }
                    }
                }
            }
            _ = shutdown.cancelled() => {
                warn!(
                    submitted,
                    completed = completed.load(Ordering::SeqCst),
                    "Shutdown requested before the worker queue drained"
                );
                return Err(SchedulerError::Cancelled);
            }
        }

        let completed = completed.load(Ordering::SeqCst);
        // Workers have exited, so this is the last reference to the slot.
        if let Some(error) = Arc::into_inner(first_error).and_then(OnceCell::into_inner) {
            return Err(SchedulerError::Task(error));
        }
        if completed < submitted && shutdown.is_cancelled() {
            return Err(SchedulerError::Cancelled);
        }

        info!(completed, "All submitted tasks finished");
        Ok(())
    }
}

async fn run_worker<E>(
    worker_id: usize,
    receiver: SharedReceiver<E>,
    rate_limiter: RateLimiter,
    first_error: Arc<OnceCell<E>>,
    completed: Arc<AtomicUsize>,
    shutdown: SharedShutdown,
) where
    E: Display + Send + 'static,
{
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                task = receiver.recv() => task,
            }
        };
        let Some(task) = next else {
            break;
        };

        if rate_limiter.admit(&shutdown).await.is_err() {
            debug!(worker_id, "Dropping queued task after shutdown request");
            break;
        }

        if let Err(error) = task.await {
            record_task_error(worker_id, &first_error, error);
        }
        completed.fetch_add(1, Ordering::SeqCst);
    }
    debug!(worker_id, "Worker exiting");
}

fn record_task_error<E: Display>(worker_id: usize, slot: &OnceCell<E>, error: E) {
    warn!(worker_id, error = %error, "Task failed");
    if let Err(later) = slot.set(error) {
        debug!(worker_id, error = %later, "Keeping earlier task error");
    }
}
