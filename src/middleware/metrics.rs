//! Metrics layer.

use super::{AsyncCallFn, CallFns, SyncCallFn};
use crate::config::ModelConfig;
use crate::metrics::{Metrics, MetricsProcessor, MetricsStore};
use crate::types::{
    tap_iter, tap_stream, AsyncOutput, CallArgs, CallScratch, LlmOutput, LlmRequest, ModelResponse,
    StreamEnd, SyncOutput,
};
use crate::{Error, Result};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

struct Recorder {
    model: ModelConfig,
    store: Arc<dyn MetricsStore>,
    processor: Arc<dyn MetricsProcessor>,
}

impl Recorder {
    fn commit(&self, mut delta: Metrics, started: Instant) {
        delta.compute_duration_seconds += started.elapsed().as_secs_f64();
        if let Err(e) = self.store.update_metrics(&delta) {
            warn!(store = self.store.id(), error = %e, "failed to record call metrics");
        }
    }

    fn on_response(&self, scratch: &CallScratch, args: &CallArgs, response: &ModelResponse, started: Instant) {
        let mut delta = scratch.take();
        if delta.cached_responses == 0 {
            self.processor.process_response(&self.model, args, response, &mut delta);
        }
        self.commit(delta, started);
    }

    /// A stream the consumer dropped early counts as a success over the chunks
    /// it delivered; only a provider error makes it a failure.
    fn on_stream_end(&self, scratch: &CallScratch, args: &CallArgs, end: StreamEnd, started: Instant) {
        let mut delta = scratch.take();
        match end {
            StreamEnd::Failed(_) => {
                delta.failed_response_count += 1;
                delta.streaming_responses += 1;
            }
            StreamEnd::Completed(chunks) | StreamEnd::Abandoned(chunks) => {
                if delta.cached_responses == 0 {
                    self.processor.process_stream(&self.model, args, &chunks, &mut delta);
                }
            }
        }
        self.commit(delta, started);
    }

    fn on_error(&self, scratch: &CallScratch, error: &Error, started: Instant) {
        let mut delta = scratch.take();
        if delta.failed_response_count == 0 && !error.is_cancelled() {
            delta.failed_response_count = 1;
        }
        self.commit(delta, started);
    }
}

async fn measured_async(recorder: Arc<Recorder>, inner: AsyncCallFn, req: LlmRequest) -> Result<AsyncOutput> {
    let started = Instant::now();
    let scratch = req.scratch().clone();
    let args = req.args.clone();
    match inner(req).await {
        Ok(LlmOutput::Response(resp)) => {
            recorder.on_response(&scratch, &args, &resp, started);
            Ok(LlmOutput::Response(resp))
        }
        Ok(LlmOutput::Stream(stream)) => Ok(LlmOutput::Stream(tap_stream(stream, move |end| {
            recorder.on_stream_end(&scratch, &args, end, started)
        }))),
        Err(e) => {
            recorder.on_error(&scratch, &e, started);
            Err(e)
        }
    }
}

/// Turn each call's outcome into a metrics delta and add it to `store`.
///
/// Counters written by inner layers into the call scratch are folded into the
/// same delta. Streams are recorded when they end; compute duration for a
/// stream covers its consumption.
pub fn wrap(
    inner: CallFns,
    model: ModelConfig,
    store: Arc<dyn MetricsStore>,
    processor: Arc<dyn MetricsProcessor>,
) -> CallFns {
    let recorder = Arc::new(Recorder { model, store, processor });
    let sync_inner = inner.sync_fn;
    let async_inner = inner.async_fn;
    let sync_recorder = recorder.clone();

    let sync_fn: SyncCallFn = Arc::new(move |req: LlmRequest| -> Result<SyncOutput> {
        let started = Instant::now();
        let scratch = req.scratch().clone();
        let args = req.args.clone();
        match sync_inner(req) {
            Ok(LlmOutput::Response(resp)) => {
                sync_recorder.on_response(&scratch, &args, &resp, started);
                Ok(LlmOutput::Response(resp))
            }
            Ok(LlmOutput::Stream(iter)) => {
                let recorder = sync_recorder.clone();
                Ok(LlmOutput::Stream(tap_iter(iter, move |end| {
                    recorder.on_stream_end(&scratch, &args, end, started)
                })))
            }
            Err(e) => {
                sync_recorder.on_error(&scratch, &e, started);
                Err(e)
            }
        }
    });

    let async_fn: AsyncCallFn = Arc::new(move |req: LlmRequest| {
        measured_async(recorder.clone(), async_inner.clone(), req).boxed()
    });

    CallFns { sync_fn, async_fn }
}
