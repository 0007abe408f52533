//! Call envelope passed through the middleware layers.

use super::args::CallArgs;
use super::response::{CompletionChunk, CompletionResponse, ModelResponse};
use crate::metrics::Metrics;
use crate::{BoxStream, Result};
use futures::TryStreamExt;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Blocking chunk sequence returned by a streaming call.
pub type ChunkIter = Box<dyn Iterator<Item = Result<CompletionChunk>> + Send>;

/// Async chunk sequence returned by a streaming call.
pub type ChunkStream = BoxStream<'static, CompletionChunk>;

/// What a call produces: a buffered response or a chunk sequence.
pub enum LlmOutput<S> {
    Response(ModelResponse),
    Stream(S),
}

pub type SyncOutput = LlmOutput<ChunkIter>;
pub type AsyncOutput = LlmOutput<ChunkStream>;

impl<S> LlmOutput<S> {
    pub fn response(&self) -> Option<&ModelResponse> {
        match self {
            LlmOutput::Response(r) => Some(r),
            LlmOutput::Stream(_) => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, LlmOutput::Stream(_))
    }
}

impl LlmOutput<ChunkIter> {
    /// Drain a stream (if any) into a buffered response.
    pub fn into_response(self) -> Result<ModelResponse> {
        match self {
            LlmOutput::Response(r) => Ok(r),
            LlmOutput::Stream(iter) => {
                let chunks = iter.collect::<Result<Vec<_>>>()?;
                Ok(CompletionResponse::from_chunks(&chunks).into())
            }
        }
    }
}

impl LlmOutput<ChunkStream> {
    /// Drain a stream (if any) into a buffered response.
    pub async fn into_response(self) -> Result<ModelResponse> {
        match self {
            LlmOutput::Response(r) => Ok(r),
            LlmOutput::Stream(stream) => {
                let chunks: Vec<CompletionChunk> = stream.try_collect().await?;
                Ok(CompletionResponse::from_chunks(&chunks).into())
            }
        }
    }
}

impl<S> fmt::Debug for LlmOutput<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmOutput::Response(r) => f.debug_tuple("Response").field(r).finish(),
            LlmOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Per-call metrics scratchpad shared by every layer handling one call.
///
/// Inner layers (retry, cache, request counting) write into it; the metrics
/// layer drains it into the store once the call settles.
#[derive(Clone, Default)]
pub struct CallScratch {
    inner: Arc<Mutex<Metrics>>,
}

impl CallScratch {
    pub fn record(&self, f: impl FnOnce(&mut Metrics)) {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard);
    }

    pub fn snapshot(&self) -> Metrics {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn take(&self) -> Metrics {
        std::mem::take(&mut *self.inner.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

impl fmt::Debug for CallScratch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallScratch").field(&self.snapshot()).finish()
    }
}

/// A single provider call travelling through the pipeline.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub args: CallArgs,
    pub cancel: CancellationToken,
    scratch: CallScratch,
}

impl LlmRequest {
    pub fn new(args: CallArgs) -> Self {
        Self {
            args,
            cancel: CancellationToken::new(),
            scratch: CallScratch::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn scratch(&self) -> &CallScratch {
        &self.scratch
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl From<CallArgs> for LlmRequest {
    fn from(args: CallArgs) -> Self {
        Self::new(args)
    }
}
