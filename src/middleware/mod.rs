//! 中间件模块：将缓存、限流、重试、指标与日志组合到模型调用函数外层。
//!
//! # Middleware Module
//!
//! A model call is a pair of functions with the same contract: a blocking
//! [`SyncCallFn`] and a suspending [`AsyncCallFn`]. Every layer takes such a
//! pair and returns a new pair, so layers compose freely and any of them can
//! be left out.
//!
//! ## Layer Order
//!
//! Outermost first:
//!
//! | Layer | Module | Effect |
//! |-------|--------|--------|
//! | logging | [`logging`] | request id span, outcome and latency events |
//! | request count | [`request_count`] | counts attempted requests |
//! | metrics | [`metrics`] | turns the call outcome into a metrics delta |
//! | cache | [`cache`] | serves hits, stores completed responses |
//! | rate limit | [`rate_limit`] | admission before the call, true-up after |
//! | retry | [`retry`] | re-invokes the inner call on transient errors |
//! | base | | the provider call, guarded by the cancellation token |
//!
//! The blocking and suspending halves share cache, limiter, retry policy and
//! metrics store, so mixing them on one pipeline keeps a single set of books.

pub mod cache;
pub mod logging;
pub mod metrics;
mod pipeline;
pub mod rate_limit;
pub mod request_count;
pub mod retry;

pub use pipeline::LlmPipeline;

use crate::cache::CacheManager;
use crate::config::ModelConfig;
use crate::metrics::{MetricsProcessor, MetricsStore};
use crate::resilience::{RateLimiter, Retrier};
use crate::tokens::TokenCounter;
use crate::types::{AsyncOutput, LlmRequest, SyncOutput};
use crate::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

pub type SyncCallFn = Arc<dyn Fn(LlmRequest) -> Result<SyncOutput> + Send + Sync>;

pub type AsyncCallFn =
    Arc<dyn Fn(LlmRequest) -> BoxFuture<'static, Result<AsyncOutput>> + Send + Sync>;

/// A blocking and a suspending entry point with identical behaviour.
#[derive(Clone)]
pub struct CallFns {
    pub sync_fn: SyncCallFn,
    pub async_fn: AsyncCallFn,
}

impl CallFns {
    pub fn new<S, A, Fut>(sync_fn: S, async_fn: A) -> Self
    where
        S: Fn(LlmRequest) -> Result<SyncOutput> + Send + Sync + 'static,
        A: Fn(LlmRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<AsyncOutput>> + Send + 'static,
    {
        Self {
            sync_fn: Arc::new(sync_fn),
            async_fn: Arc::new(move |req: LlmRequest| async_fn(req).boxed()),
        }
    }

    pub fn call(&self, request: LlmRequest) -> Result<SyncOutput> {
        (self.sync_fn)(request)
    }

    pub async fn call_async(&self, request: LlmRequest) -> Result<AsyncOutput> {
        (self.async_fn)(request).await
    }
}

/// Metrics layer collaborators.
#[derive(Clone)]
pub struct MetricsLayer {
    pub store: Arc<dyn MetricsStore>,
    pub processor: Arc<dyn MetricsProcessor>,
}

/// Rate-limit layer collaborators.
#[derive(Clone)]
pub struct RateLimitLayer {
    pub limiter: Arc<dyn RateLimiter>,
    pub counter: Arc<dyn TokenCounter>,
}

/// The layers to wrap around a base call pair; `None`/`false` leaves a layer out.
#[derive(Clone)]
pub struct MiddlewareLayers {
    pub model: ModelConfig,
    pub log_calls: bool,
    pub count_requests: bool,
    pub metrics: Option<MetricsLayer>,
    pub cache: Option<CacheManager>,
    pub rate_limit: Option<RateLimitLayer>,
    pub retry: Option<Retrier>,
}

impl MiddlewareLayers {
    /// No layers at all; the wrapped pair only adds the cancellation guard.
    pub fn new(model: ModelConfig) -> Self {
        Self {
            model,
            log_calls: false,
            count_requests: false,
            metrics: None,
            cache: None,
            rate_limit: None,
            retry: None,
        }
    }

    pub fn with_logging(mut self) -> Self {
        self.log_calls = true;
        self
    }

    pub fn with_request_count(mut self) -> Self {
        self.count_requests = true;
        self
    }

    pub fn with_metrics(mut self, store: Arc<dyn MetricsStore>, processor: Arc<dyn MetricsProcessor>) -> Self {
        self.metrics = Some(MetricsLayer { store, processor });
        self
    }

    pub fn with_cache(mut self, cache: CacheManager) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_rate_limit(mut self, limiter: Arc<dyn RateLimiter>, counter: Arc<dyn TokenCounter>) -> Self {
        self.rate_limit = Some(RateLimitLayer { limiter, counter });
        self
    }

    pub fn with_retry(mut self, retrier: Retrier) -> Self {
        self.retry = Some(retrier);
        self
    }
}

/// Wrap `base` in the selected layers, innermost first.
pub fn with_middleware(base: CallFns, layers: &MiddlewareLayers) -> CallFns {
    let mut fns = cancellation_guard(base);
    if let Some(retrier) = &layers.retry {
        fns = retry::wrap(fns, retrier.clone());
    }
    if let Some(rl) = &layers.rate_limit {
        fns = rate_limit::wrap(fns, rl.limiter.clone(), rl.counter.clone());
    }
    if let Some(cache) = &layers.cache {
        fns = cache::wrap(fns, cache.clone(), layers.model.id());
    }
    if let Some(m) = &layers.metrics {
        fns = metrics::wrap(fns, layers.model.clone(), m.store.clone(), m.processor.clone());
    }
    if layers.count_requests {
        fns = request_count::wrap(fns);
    }
    if layers.log_calls {
        fns = logging::wrap(fns, layers.model.id());
    }
    fns
}

/// Refuse to start a cancelled call; abort an in-flight async call on cancel.
fn cancellation_guard(inner: CallFns) -> CallFns {
    let sync_inner = inner.sync_fn;
    let async_inner = inner.async_fn;

    let sync_fn: SyncCallFn = Arc::new(move |req: LlmRequest| {
        if req.is_cancelled() {
            return Err(Error::Cancelled);
        }
        sync_inner(req)
    });

    let async_fn: AsyncCallFn = Arc::new(move |req: LlmRequest| {
        let cancel = req.cancel.clone();
        let call = async_inner(req);
        async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                res = call => res,
            }
        }
        .boxed()
    });

    CallFns { sync_fn, async_fn }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::error_code::ProviderErrorKind;
    use crate::types::{CompletionChunk, CompletionResponse, LlmOutput, Usage};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn answer(calls: &AtomicU32, failures: u32, req: &LlmRequest) -> Result<Option<Vec<CompletionChunk>>> {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < failures {
            return Err(Error::provider(ProviderErrorKind::ServiceUnavailable, "try later"));
        }
        if req.args.is_streaming() {
            Ok(Some(vec![
                CompletionChunk::text("o"),
                CompletionChunk::text("k").with_usage(Usage::new(10, 2)),
            ]))
        } else {
            Ok(None)
        }
    }

    fn ok_response<S>() -> LlmOutput<S> {
        LlmOutput::Response(
            CompletionResponse::new("gpt-4o", "ok")
                .with_usage(Usage::new(10, 2))
                .into(),
        )
    }

    /// Base pair that fails `failures` times with a transient error, then
    /// answers "ok" (streamed as two chunks when the call asks for a stream).
    pub(crate) fn flaky_base(failures: u32) -> (CallFns, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));

        let c = calls.clone();
        let sync_fn = move |req: LlmRequest| -> Result<SyncOutput> {
            match answer(&c, failures, &req)? {
                Some(chunks) => {
                    let iter = chunks.into_iter().map(Ok::<CompletionChunk, Error>);
                    Ok(LlmOutput::Stream(Box::new(iter)))
                }
                None => Ok(ok_response()),
            }
        };
        let c = calls.clone();
        let async_fn = move |req: LlmRequest| {
            let res = answer(&c, failures, &req);
            async move {
                let out: AsyncOutput = match res? {
                    Some(chunks) => {
                        let items = chunks.into_iter().map(Ok::<CompletionChunk, Error>);
                        let stream: crate::types::ChunkStream = Box::pin(futures::stream::iter(items));
                        LlmOutput::Stream(stream)
                    }
                    None => ok_response(),
                };
                Ok::<AsyncOutput, Error>(out)
            }
        };
        (CallFns::new(sync_fn, async_fn), calls)
    }
}
