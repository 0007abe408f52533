//! 类型系统模块：调用参数、响应与中间件请求封装。
//!
//! # Types Module
//!
//! Core data types shared by every layer of the resilience pipeline.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HashableValue`] | Tagged union used to describe call arguments structurally |
//! | [`CallArgs`] | Keyword arguments of a provider call |
//! | [`Message`] | Chat message with role and content |
//! | [`ModelResponse`] | Buffered completion or embedding response |
//! | [`CompletionChunk`] | One element of a streamed completion |
//! | [`LlmRequest`] | Call envelope carrying arguments, cancellation and scratch metrics |
//! | [`LlmOutput`] | Buffered response or chunk sequence |
//!
//! ## Example
//!
//! ```rust
//! use graphrag_llm::types::{CallArgs, Message};
//!
//! let args = CallArgs::new()
//!     .with_model("gpt-4o")
//!     .with_messages(&[Message::user("Summarize the community report")])
//!     .with("temperature", 0.0);
//! assert_eq!(args.model(), Some("gpt-4o"));
//! ```

pub mod args;
pub mod message;
pub mod request;
pub mod response;
pub mod stream;
pub mod value;

pub use args::CallArgs;
pub use message::{Message, MessageRole};
pub use request::{
    AsyncOutput, CallScratch, ChunkIter, ChunkStream, LlmOutput, LlmRequest, SyncOutput,
};
pub use response::{CompletionChunk, CompletionResponse, EmbeddingResponse, ModelResponse, Usage};
pub use stream::{tap_iter, tap_stream, StreamEnd};
pub use value::HashableValue;
