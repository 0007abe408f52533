//! Request counting layer.

use super::{AsyncCallFn, CallFns, SyncCallFn};
use crate::types::LlmRequest;
use std::sync::Arc;

fn count(req: &LlmRequest) {
    req.scratch().record(|m| m.attempted_request_count += 1);
}

/// Count every call entering the pipeline, cache hits included.
pub fn wrap(inner: CallFns) -> CallFns {
    let sync_inner = inner.sync_fn;
    let async_inner = inner.async_fn;

    let sync_fn: SyncCallFn = Arc::new(move |req: LlmRequest| {
        count(&req);
        sync_inner(req)
    });
    let async_fn: AsyncCallFn = Arc::new(move |req: LlmRequest| {
        count(&req);
        async_inner(req)
    });

    CallFns { sync_fn, async_fn }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::flaky_base;
    use crate::types::CallArgs;

    #[tokio::test]
    async fn test_counts_into_the_call_scratch() {
        let (base, _) = flaky_base(0);
        let fns = wrap(base);
        let req = LlmRequest::new(CallArgs::new());
        fns.call(req.clone()).unwrap();
        fns.call_async(req.clone()).await.unwrap();
        assert_eq!(req.scratch().snapshot().attempted_request_count, 2);
    }
}
