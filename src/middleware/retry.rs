//! Retry layer.

use super::{AsyncCallFn, CallFns, SyncCallFn};
use crate::resilience::Retrier;
use crate::types::{CallScratch, LlmRequest};
use crate::Error;
use futures::FutureExt;
use std::sync::Arc;

fn note_attempt(scratch: &CallScratch, attempt: u32) {
    if attempt > 1 {
        scratch.record(|m| {
            m.retries += 1;
            if attempt == 2 {
                m.requests_with_retries += 1;
            }
        });
    }
}

fn note_failure(scratch: &CallScratch, error: &Error) {
    if !error.is_cancelled() {
        scratch.record(|m| m.failed_response_count += 1);
    }
}

/// Re-invoke the inner call under the retrier's policy.
///
/// Each failed attempt is counted as a failed response. For streaming calls
/// only establishing the stream is retried; errors inside the stream reach
/// the consumer.
pub fn wrap(inner: CallFns, retrier: Retrier) -> CallFns {
    let sync_inner = inner.sync_fn;
    let async_inner = inner.async_fn;
    let sync_retrier = retrier.clone();

    let sync_fn: SyncCallFn = Arc::new(move |req: LlmRequest| {
        let scratch = req.scratch().clone();
        let cancel = req.cancel.clone();
        sync_retrier.retry(&cancel, |attempt| {
            note_attempt(&scratch, attempt);
            sync_inner(req.clone()).map_err(|e| {
                note_failure(&scratch, &e);
                e
            })
        })
    });

    let async_fn: AsyncCallFn = Arc::new(move |req: LlmRequest| {
        let inner = async_inner.clone();
        let retrier = retrier.clone();
        async move {
            let scratch = req.scratch().clone();
            let cancel = req.cancel.clone();
            retrier
                .retry_async(&cancel, |attempt| {
                    note_attempt(&scratch, attempt);
                    let call = inner(req.clone());
                    let scratch = scratch.clone();
                    async move {
                        call.await.map_err(|e| {
                            note_failure(&scratch, &e);
                            e
                        })
                    }
                })
                .await
        }
        .boxed()
    });

    CallFns { sync_fn, async_fn }
}
