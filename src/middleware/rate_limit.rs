//! Rate limiting layer.

use super::{AsyncCallFn, CallFns, SyncCallFn};
use crate::resilience::{RateLimitPermit, RateLimiter};
use crate::tokens::TokenCounter;
use crate::types::{
    tap_iter, tap_stream, AsyncOutput, LlmOutput, LlmRequest, StreamEnd, SyncOutput, Usage,
};
use crate::Result;
use futures::FutureExt;
use std::sync::Arc;
use tracing::debug;

/// Replace the estimate with the usage the provider reported, if any.
fn settle(permit: &mut RateLimitPermit, usage: Option<&Usage>) {
    if let Some(u) = usage {
        debug!(estimated = permit.tokens(), actual = u.total_tokens, "settling rate limit permit");
        permit.settle(u.total_tokens);
    }
}

fn stream_usage(end: &StreamEnd) -> Option<Usage> {
    end.chunks().iter().filter_map(|c| c.usage).fold(None, |acc, u| {
        let mut total = acc.unwrap_or_default();
        total.accumulate(&u);
        Some(total)
    })
}

async fn admit_async(
    inner: AsyncCallFn,
    limiter: Arc<dyn RateLimiter>,
    estimate: u64,
    req: LlmRequest,
) -> Result<AsyncOutput> {
    let mut permit = limiter.acquire(estimate, &req.cancel).await?;
    match inner(req).await? {
        LlmOutput::Response(resp) => {
            settle(&mut permit, resp.usage());
            Ok(LlmOutput::Response(resp))
        }
        LlmOutput::Stream(stream) => Ok(LlmOutput::Stream(tap_stream(stream, move |end| {
            let mut permit = permit;
            settle(&mut permit, stream_usage(&end).as_ref());
        }))),
    }
}

/// Admit each call through `limiter` using a token estimate of its arguments.
///
/// The permit is held until the response is returned or, for streams, until
/// the stream ends or is dropped.
pub fn wrap(inner: CallFns, limiter: Arc<dyn RateLimiter>, counter: Arc<dyn TokenCounter>) -> CallFns {
    let sync_inner = inner.sync_fn;
    let async_inner = inner.async_fn;
    let sync_limiter = limiter.clone();
    let sync_counter = counter.clone();

    let sync_fn: SyncCallFn = Arc::new(move |req: LlmRequest| -> Result<SyncOutput> {
        let estimate = sync_counter.estimate_args(&req.args);
        let mut permit = sync_limiter.acquire_blocking(estimate, &req.cancel)?;
        match sync_inner(req)? {
            LlmOutput::Response(resp) => {
                settle(&mut permit, resp.usage());
                Ok(LlmOutput::Response(resp))
            }
            LlmOutput::Stream(iter) => Ok(LlmOutput::Stream(tap_iter(iter, move |end| {
                let mut permit = permit;
                settle(&mut permit, stream_usage(&end).as_ref());
            }))),
        }
    });

    let async_fn: AsyncCallFn = Arc::new(move |req: LlmRequest| {
        let estimate = counter.estimate_args(&req.args);
        admit_async(async_inner.clone(), limiter.clone(), estimate, req).boxed()
    });

    CallFns { sync_fn, async_fn }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::middleware::test_support::flaky_base;
    use crate::resilience::SlidingWindowRateLimiter;
    use crate::tokens::CharacterEstimator;
    use crate::types::CallArgs;
    use std::time::Duration;

    fn limited(requests: u64) -> (CallFns, Arc<SlidingWindowRateLimiter>) {
        let (base, _) = flaky_base(0);
        let cfg = RateLimitConfig::new(1)
            .with_requests_per_period(requests)
            .with_tokens_per_period(10_000);
        let limiter = Arc::new(SlidingWindowRateLimiter::new(&cfg).unwrap());
        let fns = wrap(base, limiter.clone(), Arc::new(CharacterEstimator::new()));
        (fns, limiter)
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_calls_are_admitted_through_the_window() {
        let (fns, _) = limited(2);
        let start = tokio::time::Instant::now();
        for _ in 0..3 {
            fns.call_async(LlmRequest::new(CallArgs::new().with("max_tokens", 100)))
                .await
                .unwrap();
        }
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[test]
    fn test_response_usage_settles_the_permit() {
        let (fns, limiter) = limited(5);
        fns.call(LlmRequest::new(CallArgs::new().with("max_tokens", 500)))
            .unwrap();
        let snap = limiter.snapshot();
        assert_eq!(snap.tokens_in_window, 12);
        assert_eq!(snap.in_flight, 0);
    }

    #[test]
    fn test_stream_holds_permit_until_drained() {
        let (fns, limiter) = limited(5);
        let out = fns
            .call(LlmRequest::new(CallArgs::new().with_stream(true).with("max_tokens", 500)))
            .unwrap();
        assert_eq!(limiter.snapshot().in_flight, 1);
        let resp = out.into_response().unwrap();
        assert_eq!(resp.content(), Some("ok"));
        let snap = limiter.snapshot();
        assert_eq!(snap.in_flight, 0);
        assert_eq!(snap.tokens_in_window, 12);
    }
}
