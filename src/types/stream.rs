//! Observers for streamed chunk sequences.
//!
//! Layers that need the whole stream (cache writes, usage metrics) wrap the
//! inner iterator or stream in a tap. The tap forwards every item unchanged and
//! reports how the sequence ended exactly once.

use super::request::{ChunkIter, ChunkStream};
use super::response::CompletionChunk;
use crate::Result;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// How a tapped stream finished, with the chunks seen so far.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEnd {
    Completed(Vec<CompletionChunk>),
    Failed(Vec<CompletionChunk>),
    /// Dropped by the consumer before the end was reached.
    Abandoned(Vec<CompletionChunk>),
}

impl StreamEnd {
    pub fn chunks(&self) -> &[CompletionChunk] {
        match self {
            StreamEnd::Completed(c) | StreamEnd::Failed(c) | StreamEnd::Abandoned(c) => c,
        }
    }
}

type OnEnd = Box<dyn FnOnce(StreamEnd) + Send>;

struct Tap {
    chunks: Vec<CompletionChunk>,
    on_end: Option<OnEnd>,
}

impl Tap {
    fn new(on_end: OnEnd) -> Self {
        Self {
            chunks: Vec::new(),
            on_end: Some(on_end),
        }
    }

    fn observe(&mut self, item: &Option<Result<CompletionChunk>>) {
        if self.on_end.is_none() {
            return;
        }
        match item {
            Some(Ok(chunk)) => self.chunks.push(chunk.clone()),
            Some(Err(_)) => self.finish(StreamEnd::Failed),
            None => self.finish(StreamEnd::Completed),
        }
    }

    fn finish(&mut self, end: fn(Vec<CompletionChunk>) -> StreamEnd) {
        if let Some(on_end) = self.on_end.take() {
            on_end(end(std::mem::take(&mut self.chunks)));
        }
    }
}

impl Drop for Tap {
    fn drop(&mut self) {
        self.finish(StreamEnd::Abandoned);
    }
}

struct TapIter {
    inner: ChunkIter,
    tap: Tap,
}

impl Iterator for TapIter {
    type Item = Result<CompletionChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next();
        self.tap.observe(&item);
        item
    }
}

struct TapStream {
    inner: ChunkStream,
    tap: Tap,
}

impl Stream for TapStream {
    type Item = Result<CompletionChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(item) => {
                this.tap.observe(&item);
                Poll::Ready(item)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Wrap a blocking chunk iterator; `on_end` runs once when it ends or is dropped.
pub fn tap_iter(inner: ChunkIter, on_end: impl FnOnce(StreamEnd) + Send + 'static) -> ChunkIter {
    Box::new(TapIter {
        inner,
        tap: Tap::new(Box::new(on_end)),
    })
}

/// Wrap an async chunk stream; `on_end` runs once when it ends or is dropped.
pub fn tap_stream(
    inner: ChunkStream,
    on_end: impl FnOnce(StreamEnd) + Send + 'static,
) -> ChunkStream {
    Box::pin(TapStream {
        inner,
        tap: Tap::new(Box::new(on_end)),
    })
}
