//! Adaptive sizing scenarios
//!
//! All tests run on paused tokio time, so task durations are exact and the
//! fast/slow classification is deterministic.
//!
//! Run with: cargo test -p autoscale-executor --test adaptive_scenarios

use std::sync::Arc;
use std::time::Duration;

use autoscale_executor::{AdaptiveExecutor, ExecutorConfig};
use tokio::sync::Notify;

const SETTLE: Duration = Duration::from_millis(500);

fn executor(pool_size: usize, timeout_ms: u64) -> AdaptiveExecutor {
    AdaptiveExecutor::new(
        ExecutorConfig::new(pool_size)
            .with_task_timeout(Duration::from_millis(timeout_ms))
            .with_name_prefix("scenario"),
    )
    .expect("valid config")
}

async fn run_fast(executor: &AdaptiveExecutor) {
    executor.submit(async {}).await.unwrap();
    tokio::time::sleep(SETTLE).await;
}

async fn run_slow(executor: &AdaptiveExecutor) {
    executor
        .submit(async move { tokio::time::sleep(Duration::from_millis(200)).await })
        .await
        .unwrap();
    tokio::time::sleep(SETTLE).await;
}

// ============================================
// Single-step scenarios
// ============================================

#[tokio::test(start_paused = true)]
async fn test_fast_tasks_cannot_grow_past_max() {
    let executor = executor(3, 100);

    for _ in 0..3 {
        executor.submit(async {}).await.unwrap();
    }
    assert_eq!(executor.worker_count(), 3);
    tokio::time::sleep(SETTLE).await;

    assert_eq!(executor.current_pool_size(), 3);
    assert_eq!(executor.available_permits(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_slow_task_shrinks_by_one() {
    let executor = executor(3, 100);

    run_slow(&executor).await;

    assert_eq!(executor.current_pool_size(), 2);
    assert_eq!(executor.available_permits(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_task_at_floor_keeps_permit_in_circulation() {
    let executor = executor(3, 100);
    run_slow(&executor).await;
    run_slow(&executor).await;
    assert_eq!(executor.current_pool_size(), 1);
    assert_eq!(executor.available_permits(), 1);

    run_slow(&executor).await;

    assert_eq!(executor.current_pool_size(), 1);
    assert_eq!(executor.available_permits(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_from_floor_one_step_per_fast_task() {
    let executor = executor(3, 100);
    run_slow(&executor).await;
    run_slow(&executor).await;
    assert_eq!(executor.current_pool_size(), 1);

    run_fast(&executor).await;
    assert_eq!(executor.current_pool_size(), 2);
    assert_eq!(executor.available_permits(), 2);

    run_fast(&executor).await;
    assert_eq!(executor.current_pool_size(), 3);
    assert_eq!(executor.available_permits(), 3);

    run_fast(&executor).await;
    assert_eq!(executor.current_pool_size(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_task_exactly_at_threshold_is_slow() {
    let executor = executor(2, 100);

    executor
        .submit(async move { tokio::time::sleep(Duration::from_millis(100)).await })
        .await
        .unwrap();
    tokio::time::sleep(SETTLE).await;

    assert_eq!(executor.current_pool_size(), 1);
}

// ============================================
// Full sequences
// ============================================

#[test_log::test(tokio::test(start_paused = true))]
async fn test_shrink_floor_and_recover_sequence() {
    let executor = executor(3, 100);
    assert_eq!(executor.worker_count(), 0);
    assert_eq!(executor.current_pool_size(), 3);

    for _ in 0..3 {
        executor.submit(async {}).await.unwrap();
    }
    assert_eq!(executor.worker_count(), 3);
    tokio::time::sleep(SETTLE).await;
    assert_eq!(executor.current_pool_size(), 3);

    let mut sizes = Vec::new();
    for _ in 0..4 {
        run_slow(&executor).await;
        sizes.push(executor.current_pool_size());
    }
    assert_eq!(sizes, vec![2, 1, 1, 1]);

    sizes.clear();
    for _ in 0..4 {
        run_fast(&executor).await;
        sizes.push(executor.current_pool_size());
    }
    assert_eq!(sizes, vec![2, 3, 3, 3]);

    // Idle longer than the keep-alive (2 x 100ms): every worker is reclaimed
    assert_eq!(executor.worker_count(), 0);

    executor
        .submit(async move { tokio::time::sleep(Duration::from_millis(10)).await })
        .await
        .unwrap();
    assert_eq!(executor.worker_count(), 1);
    tokio::time::sleep(SETTLE).await;
    assert_eq!(executor.worker_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sustained_load_collapses_then_recovers() {
    let executor = executor(5, 500);

    for _ in 0..10 {
        executor
            .submit(async move { tokio::time::sleep(Duration::from_millis(1000)).await })
            .await
            .unwrap();
    }
    assert_eq!(executor.current_pool_size(), 1);

    for _ in 0..10 {
        executor
            .submit(async move { tokio::time::sleep(Duration::from_millis(100)).await })
            .await
            .unwrap();
    }

    let report = executor.drain_and_shutdown().await;
    assert!(report.graceful);
    assert_eq!(executor.current_pool_size(), 5);
}

// ============================================
// Capacity follows the effective size
// ============================================

#[tokio::test(start_paused = true)]
async fn test_shrunk_pool_admits_one_task_at_a_time() {
    let executor = executor(3, 100);
    run_slow(&executor).await;
    run_slow(&executor).await;
    assert_eq!(executor.current_pool_size(), 1);

    let gate = Arc::new(Notify::new());
    let held = Arc::clone(&gate);
    executor
        .submit(async move { held.notified().await })
        .await
        .unwrap();

    let second = tokio::time::timeout(Duration::from_secs(1), executor.submit(async {})).await;
    assert!(second.is_err(), "only one task may be outstanding at size 1");

    gate.notify_one();
    executor.submit(async {}).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_completions_keep_size_in_bounds() {
    let executor = Arc::new(executor(4, 50));

    let mut submitters = Vec::new();
    for n in 0..4u64 {
        let executor = Arc::clone(&executor);
        submitters.push(tokio::spawn(async move {
            for i in 0..25u64 {
                // Alternate fast and slow tasks across submitters
                let ms = if (n + i) % 3 == 0 { 80 } else { 5 };
                executor
                    .submit(async move { tokio::time::sleep(Duration::from_millis(ms)).await })
                    .await
                    .unwrap();
                let size = executor.current_pool_size();
                assert!((1..=4).contains(&size), "size {size} out of bounds");
            }
        }));
    }
    for submitter in submitters {
        submitter.await.unwrap();
    }

    executor.drain_and_shutdown().await;
    let size = executor.current_pool_size();
    assert!((1..=4).contains(&size));
    assert!(executor.worker_count() == 0);
}
