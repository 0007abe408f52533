use super::wait;
use crate::config::RateLimitConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterSnapshot {
    pub requests_in_window: u64,
    pub tokens_in_window: u64,
    /// Permits handed out and not yet dropped.
    pub in_flight: u64,
    /// Estimated wait (ms) before a zero-token request would be admitted.
    pub estimated_wait_ms: Option<u64>,
}

/// Admission control for provider calls.
///
/// `acquire` suspends and `acquire_blocking` blocks the thread until the call
/// fits the limiter's budget. Both return early with [`Error::Cancelled`] when
/// the token is cancelled.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn acquire(&self, tokens: u64, cancel: &CancellationToken) -> Result<RateLimitPermit>;

    fn acquire_blocking(&self, tokens: u64, cancel: &CancellationToken) -> Result<RateLimitPermit>;

    fn snapshot(&self) -> RateLimiterSnapshot;

    fn name(&self) -> &'static str;
}

/// Hooks a limiter attaches to the permits it hands out.
pub trait PermitHandle: Send + Sync {
    /// Replace the admitted token estimate with the real usage.
    fn settle(&self, tokens: u64);
    fn release(&self);
}

/// Proof of admission. Dropping it releases the slot on every exit path.
pub struct RateLimitPermit {
    tokens: u64,
    handle: Option<Box<dyn PermitHandle>>,
}

impl RateLimitPermit {
    pub fn new(tokens: u64, handle: Box<dyn PermitHandle>) -> Self {
        Self {
            tokens,
            handle: Some(handle),
        }
    }

    /// Permit not backed by any limiter.
    pub fn unlimited(tokens: u64) -> Self {
        Self {
            tokens,
            handle: None,
        }
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn settle(&mut self, actual_tokens: u64) {
        if let Some(h) = &self.handle {
            h.settle(actual_tokens);
        }
        self.tokens = actual_tokens;
    }
}

impl Drop for RateLimitPermit {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            h.release();
        }
    }
}

impl fmt::Debug for RateLimitPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitPermit")
            .field("tokens", &self.tokens)
            .field("limited", &self.handle.is_some())
            .finish()
    }
}

#[derive(Debug)]
struct WindowEntry {
    id: u64,
    admitted_at: Instant,
    tokens: u64,
}

#[derive(Debug, Default)]
struct WindowState {
    log: VecDeque<WindowEntry>,
    token_sum: u64,
    next_id: u64,
    in_flight: u64,
}

impl WindowState {
    fn evict(&mut self, now: Instant, period: Duration) {
        while let Some(front) = self.log.front() {
            if now.duration_since(front.admitted_at) < period {
                break;
            }
            self.token_sum = self.token_sum.saturating_sub(front.tokens);
            self.log.pop_front();
        }
        if self.log.is_empty() {
            self.token_sum = 0;
        }
    }
}

type SharedState = Arc<Mutex<WindowState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, WindowState> {
    state.lock().unwrap_or_else(|p| p.into_inner())
}

/// Sliding-window limiter over requests and tokens.
///
/// Every admission is logged with its time and token estimate; an admission
/// is allowed only while the entries younger than the period, plus the new
/// one, stay within both limits. A request whose estimate alone exceeds the
/// token limit is admitted once the window is empty.
pub struct SlidingWindowRateLimiter {
    period: Duration,
    requests_per_period: Option<u64>,
    tokens_per_period: Option<u64>,
    state: SharedState,
}

impl SlidingWindowRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            period: Duration::from_secs(config.period_in_seconds),
            requests_per_period: config.requests_per_period,
            tokens_per_period: config.tokens_per_period,
            state: Arc::new(Mutex::new(WindowState::default())),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn fits(&self, requests: u64, token_sum: u64, tokens: u64) -> bool {
        let requests_ok = self.requests_per_period.map_or(true, |limit| requests + 1 <= limit);
        let tokens_ok = self
            .tokens_per_period
            .map_or(true, |limit| requests == 0 || token_sum.saturating_add(tokens) <= limit);
        requests_ok && tokens_ok
    }

    /// Time until enough of the oldest entries age out for `tokens` to fit.
    fn wait_for(&self, st: &WindowState, tokens: u64, now: Instant) -> Duration {
        let mut requests = st.log.len() as u64;
        let mut token_sum = st.token_sum;
        for entry in &st.log {
            requests -= 1;
            token_sum = token_sum.saturating_sub(entry.tokens);
            if self.fits(requests, token_sum, tokens) {
                return (entry.admitted_at + self.period).saturating_duration_since(now);
            }
        }
        Duration::ZERO
    }

    /// Admit now or report how long to wait.
    fn try_admit(&self, tokens: u64) -> std::result::Result<RateLimitPermit, Duration> {
        let now = Instant::now();
        let mut st = lock(&self.state);
        st.evict(now, self.period);
        if !self.fits(st.log.len() as u64, st.token_sum, tokens) {
            return Err(self.wait_for(&st, tokens, now));
        }
        let id = st.next_id;
        st.next_id += 1;
        st.log.push_back(WindowEntry {
            id,
            admitted_at: now,
            tokens,
        });
        st.token_sum = st.token_sum.saturating_add(tokens);
        st.in_flight += 1;
        drop(st);

        let handle = WindowPermit {
            id,
            state: self.state.clone(),
        };
        Ok(RateLimitPermit::new(tokens, Box::new(handle)))
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowRateLimiter {
    async fn acquire(&self, tokens: u64, cancel: &CancellationToken) -> Result<RateLimitPermit> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let wait_duration = match self.try_admit(tokens) {
                Ok(permit) => return Ok(permit),
                Err(wait) => wait,
            };
            debug!(tokens, wait_ms = wait_duration.as_millis() as u64, "rate limit reached, waiting");
            wait::sleep(wait_duration, cancel).await?;
        }
    }

    fn acquire_blocking(&self, tokens: u64, cancel: &CancellationToken) -> Result<RateLimitPermit> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let wait_duration = match self.try_admit(tokens) {
                Ok(permit) => return Ok(permit),
                Err(wait) => wait,
            };
            debug!(tokens, wait_ms = wait_duration.as_millis() as u64, "rate limit reached, blocking");
            wait::sleep_blocking(wait_duration.min(wait::BLOCKING_SLICE), cancel)?;
        }
    }

    fn snapshot(&self) -> RateLimiterSnapshot {
        let now = Instant::now();
        let mut st = lock(&self.state);
        st.evict(now, self.period);
        let estimated_wait_ms = if self.fits(st.log.len() as u64, st.token_sum, 0) {
            None
        } else {
            Some(self.wait_for(&st, 0, now).as_millis() as u64)
        };
        RateLimiterSnapshot {
            requests_in_window: st.log.len() as u64,
            tokens_in_window: st.token_sum,
            in_flight: st.in_flight,
            estimated_wait_ms,
        }
    }

    fn name(&self) -> &'static str {
        "sliding_window"
    }
}

struct WindowPermit {
    id: u64,
    state: SharedState,
}

impl PermitHandle for WindowPermit {
    fn settle(&self, tokens: u64) {
        let mut st = lock(&self.state);
        // An entry that already aged out no longer counts against anyone.
        let Some(idx) = st.log.iter().position(|e| e.id == self.id) else {
            return;
        };
        let old = st.log[idx].tokens;
        st.log[idx].tokens = tokens;
        st.token_sum = st.token_sum.saturating_sub(old).saturating_add(tokens);
    }

    fn release(&self) {
        let mut st = lock(&self.state);
        st.in_flight = st.in_flight.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(requests: Option<u64>, tokens: Option<u64>) -> SlidingWindowRateLimiter {
        let mut cfg = RateLimitConfig::new(1);
        cfg.requests_per_period = requests;
        cfg.tokens_per_period = tokens;
        SlidingWindowRateLimiter::new(&cfg).unwrap()
    }

    #[test]
    fn test_config_is_validated() {
        assert!(SlidingWindowRateLimiter::new(&RateLimitConfig::new(1)).is_err());
        assert!(SlidingWindowRateLimiter::new(&RateLimitConfig::new(0).with_requests_per_period(1)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_request_waits_for_window() {
        let limiter = limiter(Some(3), None);
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let mut permits = Vec::new();
        for _ in 0..3 {
            permits.push(limiter.acquire(0, &cancel).await.unwrap());
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        permits.push(limiter.acquire(0, &cancel).await.unwrap());
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(1), "waited {:?}", waited);
        assert!(waited < Duration::from_millis(1100), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides_after_period() {
        let limiter = limiter(Some(3), None);
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            limiter.acquire(0, &cancel).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let start = Instant::now();
        limiter.acquire(0, &cancel).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_budget() {
        let limiter = limiter(None, Some(100));
        let cancel = CancellationToken::new();
        limiter.acquire(60, &cancel).await.unwrap();
        limiter.acquire(40, &cancel).await.unwrap();
        let snap = limiter.snapshot();
        assert_eq!(snap.tokens_in_window, 100);
        assert_eq!(snap.estimated_wait_ms, None);

        let start = Instant::now();
        limiter.acquire(1, &cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_request_runs_alone() {
        let limiter = limiter(None, Some(10));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        limiter.acquire(50, &cancel).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        limiter.acquire(50, &cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_estimates_saturate() {
        let huge = i64::MAX as u64 + 10;
        let window = limiter(Some(5), None);
        let cancel = CancellationToken::new();
        let mut first = window.acquire(huge, &cancel).await.unwrap();
        let _second = window.acquire(huge, &cancel).await.unwrap();
        assert_eq!(window.snapshot().tokens_in_window, u64::MAX);

        first.settle(u64::MAX);
        assert_eq!(window.snapshot().tokens_in_window, u64::MAX);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(window.snapshot().tokens_in_window, 0);

        let budget = limiter(None, Some(100));
        budget.acquire(u64::MAX, &cancel).await.unwrap();
        let start = Instant::now();
        budget.acquire(u64::MAX, &cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_and_release() {
        let limiter = limiter(None, Some(100));
        let cancel = CancellationToken::new();
        let mut permit = limiter.acquire(80, &cancel).await.unwrap();
        assert_eq!(limiter.snapshot().in_flight, 1);
        permit.settle(20);
        assert_eq!(permit.tokens(), 20);
        assert_eq!(limiter.snapshot().tokens_in_window, 20);
        drop(permit);
        let snap = limiter.snapshot();
        assert_eq!(snap.in_flight, 0);
        assert_eq!(snap.requests_in_window, 1);

        let start = Instant::now();
        limiter.acquire(80, &cancel).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting() {
        let limiter = Arc::new(limiter(Some(1), None));
        let cancel = CancellationToken::new();
        let _held = limiter.acquire(0, &cancel).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire(0, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        let res = waiter.await.unwrap();
        assert!(matches!(res, Err(Error::Cancelled)));
    }

    #[test]
    fn test_blocking_acquire() {
        let limiter = limiter(Some(2), None);
        let cancel = CancellationToken::new();
        let _a = limiter.acquire_blocking(0, &cancel).unwrap();
        let _b = limiter.acquire_blocking(0, &cancel).unwrap();
        let snap = limiter.snapshot();
        assert_eq!(snap.requests_in_window, 2);
        assert!(snap.estimated_wait_ms.is_some());

        cancel.cancel();
        assert!(matches!(
            limiter.acquire_blocking(0, &cancel),
            Err(Error::Cancelled)
        ));
    }
}
