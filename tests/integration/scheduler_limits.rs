//! Concurrency and rate bounds of the worker scheduler

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use usage_report_collector::scheduler::{SchedulerError, WorkerScheduler};
use usage_report_collector::shutdown::ShutdownCoordinator;

#[derive(Debug, thiserror::Error)]
#[error("task {0} failed")]
struct TaskError(usize);

#[tokio::test(start_paused = true)]
async fn never_runs_more_than_pool_size_tasks() {
    let scheduler =
        WorkerScheduler::<TaskError>::new(3, 1000, ShutdownCoordinator::shared()).unwrap();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for _ in 0..20 {
        let running = running.clone();
        let peak = peak.clone();
        scheduler
            .submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
    }

    scheduler.wait_until_finish().await.unwrap();
    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert_eq!(running.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn admissions_stay_within_rate_per_rolling_second() {
    const RATE: usize = 5;
    const TASKS: usize = 23;

    let scheduler =
        WorkerScheduler::<TaskError>::new(10, RATE, ShutdownCoordinator::shared()).unwrap();
    let started = Arc::new(Mutex::new(Vec::new()));
    let begin = Instant::now();

    for _ in 0..TASKS {
        let started = started.clone();
        scheduler
            .submit(async move {
                started.lock().unwrap().push(Instant::now());
                Ok(())
            })
            .await
            .unwrap();
    }
    scheduler.wait_until_finish().await.unwrap();

    let mut started = started.lock().unwrap().clone();
    started.sort();
    assert_eq!(started.len(), TASKS);

    // Any RATE + 1 consecutive starts must span at least one second.
    for pair in started.windows(RATE + 1) {
        let span = pair[RATE] - pair[0];
        assert!(span >= Duration::from_secs(1), "burst within {span:?}");
    }

    // 23 admissions at 5/s need four full windows before the last batch.
    assert!(begin.elapsed() >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn failure_does_not_stop_later_submissions() {
    let scheduler =
        WorkerScheduler::<TaskError>::new(2, 100, ShutdownCoordinator::shared()).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));

    scheduler.submit(async { Err(TaskError(0)) }).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(scheduler.has_failed());

    for _ in 0..4 {
        let ran = ran.clone();
        scheduler
            .submit(async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
    }

    let result = scheduler.wait_until_finish().await;
    assert!(matches!(result, Err(SchedulerError::Task(TaskError(0)))));
    assert_eq!(ran.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn full_queue_applies_backpressure() {
    let scheduler =
        WorkerScheduler::<TaskError>::new(1, 100, ShutdownCoordinator::shared()).unwrap();

    let slow = || async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    };

    // One running, one queued; the third submit waits for a free slot.
    scheduler.submit(slow()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    scheduler.submit(slow()).await.unwrap();

    let begin = Instant::now();
    scheduler.submit(slow()).await.unwrap();
    assert!(begin.elapsed() >= Duration::from_secs(4));

    scheduler.wait_until_finish().await.unwrap();
}
