//! 弹性模式模块：提供限流器与重试策略等可靠性保障机制。
//!
//! # Resilience Primitives Module
//!
//! Admission control and retrying for provider calls. Both come in a blocking
//! and a suspending form that share state, and both honour a caller-supplied
//! [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Sliding-window limiter over requests and tokens |
//! | [`retry`] | Exponential-backoff and immediate retry policies |
//!
//! ## Rate Limiter
//!
//! ```rust
//! use graphrag_llm::config::RateLimitConfig;
//! use graphrag_llm::resilience::rate_limiter::{RateLimiter, SlidingWindowRateLimiter};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = RateLimitConfig::new(60).with_requests_per_period(500);
//! let limiter = SlidingWindowRateLimiter::new(&config).unwrap();
//! let permit = limiter.acquire_blocking(120, &CancellationToken::new()).unwrap();
//! assert_eq!(permit.tokens(), 120);
//! ```
//!
//! ## Retry
//!
//! Provider errors on the skip list (invalid request, authentication, ...)
//! are never retried; everything else is treated as transient.
//!
//! ```rust
//! use graphrag_llm::config::RetryConfig;
//! use graphrag_llm::resilience::retry::{ExponentialBackoff, RetryPolicy};
//!
//! let policy = ExponentialBackoff::new(&RetryConfig::exponential(3, 2.0, 30.0)).unwrap();
//! assert_eq!(policy.max_retries(), 3);
//! ```

pub mod rate_limiter;
pub mod retry;
mod wait;

pub use rate_limiter::{
    PermitHandle, RateLimitPermit, RateLimiter, RateLimiterSnapshot, SlidingWindowRateLimiter,
};
pub use retry::{ExponentialBackoff, Immediate, Retrier, RetryPolicy};
