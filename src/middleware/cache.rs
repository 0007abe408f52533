//! Response cache layer.

use super::{AsyncCallFn, CallFns, SyncCallFn};
use crate::cache::CacheManager;
use crate::types::{
    tap_iter, tap_stream, AsyncOutput, ChunkIter, ChunkStream, CompletionResponse, LlmOutput,
    LlmRequest, ModelResponse, StreamEnd, SyncOutput,
};
use crate::Result;
use futures::FutureExt;
use serde_json::json;
use std::sync::Arc;

/// Replay a cached response in the shape the caller asked for.
fn replay<S>(req: &LlmRequest, response: ModelResponse, as_stream: impl FnOnce(ModelResponse) -> S) -> LlmOutput<S> {
    req.scratch().record(|m| m.cached_responses += 1);
    match &response {
        ModelResponse::Completion(_) if req.args.is_streaming() => LlmOutput::Stream(as_stream(response)),
        _ => LlmOutput::Response(response),
    }
}

fn single_chunk(response: &ModelResponse) -> Vec<Result<crate::types::CompletionChunk>> {
    response.as_completion().map(|c| Ok(c.to_chunk())).into_iter().collect()
}

/// Store a stream's reduction only if the provider finished it.
fn store_on_completion(cache: CacheManager, key: String, debug_data: serde_json::Value) -> impl FnOnce(StreamEnd) + Send + 'static {
    move |end| {
        if let StreamEnd::Completed(chunks) = end {
            let response = ModelResponse::from(CompletionResponse::from_chunks(&chunks));
            cache.set_response(&key, &response, Some(debug_data));
        }
    }
}

async fn cached_async(
    inner: AsyncCallFn,
    cache: CacheManager,
    debug_data: serde_json::Value,
    req: LlmRequest,
) -> Result<AsyncOutput> {
    let key = cache.key_for(&req.args);
    if let Some(hit) = cache.get_response_async(&key).await {
        return Ok(replay(&req, hit, |r| -> ChunkStream {
            Box::pin(futures::stream::iter(single_chunk(&r)))
        }));
    }
    match inner(req).await? {
        LlmOutput::Response(resp) => {
            cache.set_response_async(&key, &resp, Some(debug_data)).await;
            Ok(LlmOutput::Response(resp))
        }
        LlmOutput::Stream(stream) => Ok(LlmOutput::Stream(tap_stream(
            stream,
            store_on_completion(cache, key, debug_data),
        ))),
    }
}

/// Serve identical calls from `cache` and store fresh responses.
///
/// Streams are stored only once fully consumed without error; a partially
/// read or failed stream leaves no entry.
pub fn wrap(inner: CallFns, cache: CacheManager, model_id: String) -> CallFns {
    let sync_inner = inner.sync_fn;
    let async_inner = inner.async_fn;
    let sync_cache = cache.clone();
    let sync_model = model_id.clone();

    let sync_fn: SyncCallFn = Arc::new(move |req: LlmRequest| -> Result<SyncOutput> {
        let key = sync_cache.key_for(&req.args);
        if let Some(hit) = sync_cache.get_response(&key) {
            return Ok(replay(&req, hit, |r| -> ChunkIter { Box::new(single_chunk(&r).into_iter()) }));
        }
        let debug_data = json!({ "model_id": sync_model });
        match sync_inner(req)? {
            LlmOutput::Response(resp) => {
                sync_cache.set_response(&key, &resp, Some(debug_data));
                Ok(LlmOutput::Response(resp))
            }
            LlmOutput::Stream(iter) => Ok(LlmOutput::Stream(tap_iter(
                iter,
                store_on_completion(sync_cache.clone(), key, debug_data),
            ))),
        }
    });

    let async_fn: AsyncCallFn = Arc::new(move |req: LlmRequest| {
        let debug_data = json!({ "model_id": model_id });
        cached_async(async_inner.clone(), cache.clone(), debug_data, req).boxed()
    });

    CallFns { sync_fn, async_fn }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::middleware::test_support::flaky_base;
    use crate::types::{CallArgs, Message};
    use std::sync::atomic::Ordering;

    fn args() -> CallArgs {
        CallArgs::new()
            .with_model("gpt-4o")
            .with_messages(&[Message::user("hello")])
    }

    #[test]
    fn test_second_identical_call_is_a_hit() {
        let (base, calls) = flaky_base(0);
        let manager = CacheManager::new(Arc::new(MemoryCache::new()));
        let fns = wrap(base, manager.clone(), "openai/gpt-4o".into());

        fns.call(LlmRequest::new(args())).unwrap();
        let req = LlmRequest::new(args());
        let out = fns.call(req.clone()).unwrap();

        assert_eq!(out.response().and_then(|r| r.content()), Some("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(req.scratch().snapshot().cached_responses, 1);
        let stats = manager.stats();
        assert_eq!((stats.hits, stats.misses, stats.sets), (1, 1, 1));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let (base, calls) = flaky_base(1);
        let manager = CacheManager::new(Arc::new(MemoryCache::new()));
        let fns = wrap(base, manager.clone(), "openai/gpt-4o".into());

        assert!(fns.call(LlmRequest::new(args())).is_err());
        assert!(fns.call(LlmRequest::new(args())).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(manager.stats().sets, 1);
    }

    #[tokio::test]
    async fn test_completed_stream_is_stored_and_replayed() {
        let (base, calls) = flaky_base(0);
        let manager = CacheManager::new(Arc::new(MemoryCache::new()));
        let fns = wrap(base, manager.clone(), "openai/gpt-4o".into());
        let streaming = || LlmRequest::new(args().with_stream(true));

        let first = fns.call_async(streaming()).await.unwrap();
        assert!(first.is_stream());
        assert_eq!(first.into_response().await.unwrap().content(), Some("ok"));

        let second = fns.call_async(streaming()).await.unwrap();
        assert!(second.is_stream());
        assert_eq!(second.into_response().await.unwrap().content(), Some("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The stream flag is not part of the key, so a buffered call hits too.
        let buffered = fns.call(LlmRequest::new(args())).unwrap();
        assert_eq!(buffered.response().and_then(|r| r.content()), Some("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_calls_share_a_file_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (base, calls) = flaky_base(0);
        let manager = CacheManager::new(Arc::new(crate::cache::FileCache::new(dir.path())));
        let fns = wrap(base, manager.clone(), "openai/gpt-4o".into());

        fns.call_async(LlmRequest::new(args())).await.unwrap();
        let out = fns.call_async(LlmRequest::new(args())).await.unwrap();
        assert_eq!(out.into_response().await.unwrap().content(), Some("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.stats().hits, 1);
    }

    #[test]
    fn test_abandoned_stream_is_not_stored() {
        let (base, calls) = flaky_base(0);
        let manager = CacheManager::new(Arc::new(MemoryCache::new()));
        let fns = wrap(base, manager.clone(), "openai/gpt-4o".into());

        match fns.call(LlmRequest::new(args().with_stream(true))).unwrap() {
            LlmOutput::Stream(mut iter) => {
                let _ = iter.next();
            }
            LlmOutput::Response(_) => panic!("expected a stream"),
        }
        assert_eq!(manager.stats().sets, 0);
        fns.call(LlmRequest::new(args())).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
