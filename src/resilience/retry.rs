//! Retry policies and the retry loop.

use super::wait;
use crate::config::{RetryConfig, RetryType};
use crate::{Error, ErrorContext, Result};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Decides how often and how patiently a failed call is attempted again.
pub trait RetryPolicy: Send + Sync {
    /// Total attempts, the first one included.
    fn max_retries(&self) -> u32;

    /// Delay before attempt `attempt` (the first attempt is 1 and never waits).
    fn delay_before(&self, attempt: u32) -> Duration;

    fn should_retry(&self, error: &Error) -> bool {
        error.is_retryable()
    }

    fn name(&self) -> &'static str;
}

/// Exponential backoff: `min(base_delay * 2^(n-2), max_delay)` seconds before
/// attempt `n`, plus up to one second of jitter when enabled.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_retries: u32,
    base_delay: f64,
    max_delay: f64,
    jitter: bool,
}

impl ExponentialBackoff {
    pub fn new(config: &RetryConfig) -> Result<Self> {
        let mut config = config.clone();
        config.retry_type = RetryType::ExponentialBackoff;
        config.validate()?;
        Ok(Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            jitter: config.jitter,
        })
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(62) as i32;
        let mut delay = (self.base_delay * 2f64.powi(exponent)).min(self.max_delay);
        if self.jitter {
            delay = (delay + rand::thread_rng().gen::<f64>()).min(self.max_delay);
        }
        Duration::from_secs_f64(delay)
    }

    fn name(&self) -> &'static str {
        "exponential_backoff"
    }
}

/// Retry straight away, up to `max_retries` attempts.
#[derive(Debug, Clone)]
pub struct Immediate {
    max_retries: u32,
}

impl Immediate {
    pub fn new(max_retries: u32) -> Result<Self> {
        if max_retries <= 1 {
            return Err(Error::configuration_with_context(
                "max_retries must be greater than 1",
                ErrorContext::new()
                    .with_field_path("retry.max_retries")
                    .with_source("immediate_retry"),
            ));
        }
        Ok(Self { max_retries })
    }
}

impl RetryPolicy for Immediate {
    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn delay_before(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }

    fn name(&self) -> &'static str {
        "immediate"
    }
}

/// Runs an operation under a [`RetryPolicy`].
///
/// The operation receives the attempt number (from 1). Errors the policy will
/// not retry propagate at once; when attempts run out the last error
/// propagates unchanged.
#[derive(Clone)]
pub struct Retrier {
    policy: Arc<dyn RetryPolicy>,
}

impl Retrier {
    pub fn new(policy: Arc<dyn RetryPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &Arc<dyn RetryPolicy> {
        &self.policy
    }

    /// `Some(delay)` when a failure on `attempt` should be followed by another.
    fn next_delay(&self, attempt: u32, error: &Error) -> Option<Duration> {
        if !self.policy.should_retry(error) {
            debug!(attempt, error = %error, "error is not retryable");
            return None;
        }
        if attempt >= self.policy.max_retries() {
            warn!(attempt, policy = self.policy.name(), error = %error, "retries exhausted");
            return None;
        }
        let delay = self.policy.delay_before(attempt + 1);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            policy = self.policy.name(),
            error = %error,
            "attempt failed, retrying"
        );
        Some(delay)
    }

    pub fn retry<T>(
        &self,
        cancel: &CancellationToken,
        mut op: impl FnMut(u32) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => match self.next_delay(attempt, &e) {
                    Some(delay) => wait::sleep_blocking(delay, cancel)?,
                    None => return Err(e),
                },
            }
            attempt += 1;
        }
    }

    pub async fn retry_async<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) => match self.next_delay(attempt, &e) {
                    Some(delay) => wait::sleep(delay, cancel).await?,
                    None => return Err(e),
                },
            }
            attempt += 1;
        }
    }
}
