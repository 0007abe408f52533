//! Call logging layer.

use super::{AsyncCallFn, CallFns, SyncCallFn};
use crate::types::LlmRequest;
use crate::Result;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

fn call_span(model_id: &str, req: &LlmRequest) -> Span {
    info_span!(
        "llm_call",
        request_id = %Uuid::new_v4(),
        model_id = %model_id,
        streaming = req.args.is_streaming(),
    )
}

fn log_outcome<T>(result: &Result<T>, started: Instant) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(_) => info!(elapsed_ms, "llm call completed"),
        Err(e) if e.is_cancelled() => info!(elapsed_ms, "llm call cancelled"),
        Err(e) => warn!(elapsed_ms, error = %e, "llm call failed"),
    }
}

/// Open a span with a fresh request id around each call and log its outcome.
///
/// For streaming calls the outcome is logged when the stream is handed back,
/// not when it is drained.
pub fn wrap(inner: CallFns, model_id: String) -> CallFns {
    let sync_inner = inner.sync_fn;
    let async_inner = inner.async_fn;
    let sync_model = model_id.clone();

    let sync_fn: SyncCallFn = Arc::new(move |req: LlmRequest| {
        let span = call_span(&sync_model, &req);
        let _enter = span.enter();
        debug!("llm call started");
        let started = Instant::now();
        let result = sync_inner(req);
        log_outcome(&result, started);
        result
    });

    let async_fn: AsyncCallFn = Arc::new(move |req: LlmRequest| {
        let span = call_span(&model_id, &req);
        let call = async_inner(req);
        async move {
            debug!("llm call started");
            let started = Instant::now();
            let result = call.await;
            log_outcome(&result, started);
            result
        }
        .instrument(span)
        .boxed()
    });

    CallFns { sync_fn, async_fn }
}
