//! # graphrag-llm
//!
//! 为 GraphRAG 提供的大模型调用弹性层：缓存、滑动窗口限流、重试与用量指标。
//!
//! Resilient LLM invocation layer for GraphRAG. A provider call (blocking and
//! async) is wrapped in composable middleware that caches identical requests,
//! keeps request and token throughput inside a sliding window, retries
//! transient failures with backoff and aggregates per-model usage and cost.
//!
//! ## Core Ideas
//!
//! - **Two entry points, one set of books**: the blocking and async call
//!   paths share cache keys, limiter state, retry policy and metrics.
//! - **Config-selected strategies**: every component is chosen by a `type` tag
//!   through [`factory::Factories`], which ships built-ins and accepts custom
//!   registrations.
//! - **Degrade, don't fail**: cache and metrics failures are logged and
//!   swallowed; only provider errors, configuration errors and cancellation
//!   reach the caller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graphrag_llm::middleware::CallFns;
//! use graphrag_llm::types::{AsyncOutput, CallArgs, CompletionResponse, LlmOutput, Message};
//! use graphrag_llm::{LlmPipeline, PipelineConfig};
//!
//! # fn main() -> graphrag_llm::Result<()> {
//! let config = PipelineConfig::from_yaml_str(
//!     r#"
//! model:
//!   model_provider: openai
//!   model: gpt-4o
//! cache:
//!   type: memory
//! retry:
//!   type: exponential_backoff
//!   max_retries: 3
//! metrics: {}
//! "#,
//! )?;
//!
//! let base = CallFns::new(
//!     |_req| Ok(LlmOutput::Response(CompletionResponse::new("gpt-4o", "hello").into())),
//!     |_req| async {
//!         let answer = CompletionResponse::new("gpt-4o", "hello");
//!         Ok::<AsyncOutput, graphrag_llm::Error>(LlmOutput::Response(answer.into()))
//!     },
//! );
//! let pipeline = LlmPipeline::from_config(&config, base)?;
//! let answer = pipeline.complete(CallArgs::new().with_messages(&[Message::user("hi")]))?;
//! println!("{:?} / {:?}", answer.content(), pipeline.metrics());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Call arguments, responses, request envelope, stream taps |
//! | [`cache`] | Cache backends, canonical cache keys, typed cache manager |
//! | [`resilience`] | Sliding-window rate limiter and retry policies |
//! | [`metrics`] | Metrics record, stores, writers and processors |
//! | [`tokens`] | Token estimation and the model cost registry |
//! | [`middleware`] | Layer composition and the [`LlmPipeline`] root |
//! | [`config`] | Serde configuration for every component |
//! | [`factory`] | Type-tag factories for strategy selection |

pub mod cache;
pub mod config;
pub mod error_code;
pub mod factory;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod provider;
pub mod resilience;
pub mod tokens;
pub mod types;

// Re-export main types for convenience
pub use config::{
    CacheConfig, MetricsConfig, ModelConfig, PipelineConfig, RateLimitConfig, RetryConfig,
};
pub use error_code::ProviderErrorKind;
pub use metrics::Metrics;
pub use middleware::{with_middleware, CallFns, LlmPipeline, MiddlewareLayers};
pub use provider::LlmProvider;
pub use types::{CallArgs, LlmRequest, Message, ModelResponse};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, ProviderError};
