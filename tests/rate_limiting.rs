//! Sliding-window admission through the public API.

use graphrag_llm::resilience::{RateLimiter, SlidingWindowRateLimiter};
use graphrag_llm::RateLimitConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn test_three_requests_per_second() {
    let limiter = SlidingWindowRateLimiter::new(&RateLimitConfig::new(1).with_requests_per_period(3)).unwrap();
    let cancel = CancellationToken::new();
    let start = Instant::now();

    for _ in 0..3 {
        drop(limiter.acquire(1, &cancel).await.unwrap());
    }
    assert!(start.elapsed() < Duration::from_millis(10));

    drop(limiter.acquire(1, &cancel).await.unwrap());
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_are_serialized_by_the_window() {
    let limiter: Arc<dyn RateLimiter> =
        Arc::new(SlidingWindowRateLimiter::new(&RateLimitConfig::new(1).with_requests_per_period(2)).unwrap());
    let start = Instant::now();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let cancel = CancellationToken::new();
                drop(limiter.acquire(1, &cancel).await.unwrap());
                start.elapsed()
            })
        })
        .collect();

    let mut waits = Vec::new();
    for h in handles {
        waits.push(h.await.unwrap());
    }
    waits.sort();
    assert!(waits[1] < Duration::from_millis(10));
    assert!(waits[2] >= Duration::from_secs(1));
    assert!(waits[5] >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_token_budget_limits_admission() {
    let limiter = SlidingWindowRateLimiter::new(&RateLimitConfig::new(1).with_tokens_per_period(1000)).unwrap();
    let cancel = CancellationToken::new();
    let start = Instant::now();

    drop(limiter.acquire(600, &cancel).await.unwrap());
    drop(limiter.acquire(600, &cancel).await.unwrap());
    assert!(start.elapsed() >= Duration::from_secs(1));
}
