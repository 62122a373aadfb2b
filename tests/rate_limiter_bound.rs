//! Rate limiter timing
//!
//! With a budget of `count` calls per window, N sequential acquisitions take at least
//! ceil(N / count - 1) windows, and no window ever admits more than `count` starts.

use routesage::config::RateLimitConfig;
use routesage::limiter::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_millis(200);

/// Scheduler slack allowed when comparing recorded instants
const SLACK: Duration = Duration::from_millis(15);

fn assert_window_invariant(starts: &[Instant], count: usize) {
    for (i, first) in starts.iter().enumerate() {
        if let Some(later) = starts.get(i + count) {
            let gap = later.duration_since(*first);
            assert!(
                gap + SLACK >= WINDOW,
                "starts {} and {} are only {:?} apart",
                i,
                i + count,
                gap
            );
        }
    }
}

#[tokio::test]
async fn test_ten_calls_at_three_per_window_take_three_windows() {
    let limiter = RateLimiter::new(3, WINDOW);
    let started = Instant::now();
    let mut starts = Vec::new();

    for _ in 0..10 {
        limiter.acquire().await;
        starts.push(Instant::now());
    }

    let elapsed = started.elapsed();
    // ceil(10/3 - 1) = 3 full windows
    assert!(
        elapsed >= WINDOW * 3,
        "10 calls finished in {:?}, expected at least {:?}",
        elapsed,
        WINDOW * 3
    );
    assert!(elapsed < WINDOW * 8, "limiter waited far too long: {:?}", elapsed);
    assert_window_invariant(&starts, 3);
}

#[tokio::test]
async fn test_shared_limiter_bounds_concurrent_callers() {
    let limiter = Arc::new(RateLimiter::new(2, WINDOW));
    let started = Instant::now();

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now()
            })
        })
        .collect();

    let mut starts = Vec::new();
    for task in tasks {
        starts.push(task.await.expect("task should not panic"));
    }
    starts.sort();

    // ceil(6/2 - 1) = 2 full windows
    assert!(started.elapsed() >= WINDOW * 2);
    assert_window_invariant(&starts, 2);
}

#[tokio::test]
async fn test_budget_refills_after_idle_window() {
    let limiter = RateLimiter::from_config(&RateLimitConfig {
        count: 2,
        window_seconds: 1,
    });
    limiter.acquire().await;
    limiter.acquire().await;
    assert_eq!(limiter.in_window().await, 2);

    let limiter = RateLimiter::new(2, Duration::from_millis(50));
    limiter.acquire().await;
    limiter.acquire().await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    let waited = limiter.acquire().await;
    assert!(waited < Duration::from_millis(20), "waited {:?}", waited);
}
