//! Bounded-concurrency task scheduling and rate limiting
//!
//! A [`WorkerScheduler`] owns a fixed number of tokio workers that pull tasks
//! from a bounded queue. All workers share one [`RateLimiter`], so the request
//! rate is capped for the whole pool rather than per worker.
//!
//! ```no_run
//! use usage_report_collector::scheduler::{SchedulerError, WorkerScheduler};
//! use usage_report_collector::shutdown::ShutdownCoordinator;
//!
//! # #[derive(Debug, thiserror::Error)]
//! # #[error("boom")]
//! # struct MyError;
//! # async fn example() -> Result<(), SchedulerError<MyError>> {
//! let scheduler = WorkerScheduler::<MyError>::new(10, 5, ShutdownCoordinator::shared())
//!     .expect("valid pool settings");
//!
//! for day in 0..30 {
//!     scheduler
//!         .submit(async move {
//!             tracing::info!(day, "fetching");
//!             Ok(())
//!         })
//!         .await?;
//! }
//!
//! scheduler.wait_until_finish().await
//! # }
//! ```
//!
//! # Components
//!
//! - [`worker_pool`] - Worker pool, submission queue and first-error policy
//! - [`rate_limit`] - Rolling-window admission shared by all workers
//! - [`config`] - Defaults and retry backoff calculation

pub mod config;
pub mod rate_limit;
pub mod worker_pool;

pub use rate_limit::{RateLimitError, RateLimiter};
pub use worker_pool::{SchedulerError, Task, WorkerScheduler};
