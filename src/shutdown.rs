//! Run cancellation
//!
//! The caller of [`Collector::execute`](crate::Collector::execute) owns a
//! [`ShutdownCoordinator`] and passes it down to the scheduler, the rate
//! limiter and every worker. After [`cancel`](ShutdownCoordinator::cancel)
//! no further window is admitted or started; fetches already in flight run
//! to completion in the background.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cancellation handle passed to the scheduler and its workers
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// One-way cancellation flag that async tasks can await
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    cancelled: AtomicBool,
    wakeup: Notify,
}

impl ShutdownCoordinator {
    /// Flag that has not been raised
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh flag behind an [`Arc`], ready to hand to a run
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Cancel the run
    ///
    /// Only the first call wakes the waiters; later calls do nothing.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.wakeup.notify_waiters();
    }

    /// Whether [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the run is cancelled
    ///
    /// Meant to be raced against admission, submission and token requests in
    /// a `select!`.
    pub async fn cancelled(&self) {
        let wakeup = self.wakeup.notified();
        tokio::pin!(wakeup);
        // Register before reading the flag so a cancel in between still wakes us.
        wakeup.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        wakeup.await;
    }
}
