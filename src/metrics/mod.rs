//! 指标模块：按模型聚合调用次数、Token 用量与成本。
//!
//! # Metrics Module
//!
//! Every pipeline call produces a [`Metrics`] delta. A [`MetricsProcessor`]
//! derives tokens and cost from the response, a [`MetricsStore`] merges the
//! delta into per-model totals and an optional [`MetricsWriter`] persists each
//! new total.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Metrics`] | Additive counters plus derived rates |
//! | [`MemoryMetricsStore`] | Lock-protected running totals |
//! | [`MetricsStoreRegistry`] | One store per model id |
//! | [`LogMetricsWriter`] | Structured `tracing` event per update |
//! | [`FileMetricsWriter`] | JSON-lines file per run |
//! | [`DefaultMetricsProcessor`] | Usage and cost from responses |
//!
//! Store and writer failures are logged, never surfaced to the caller of a
//! model call.

mod processor;
mod record;
mod store;
mod writer;

pub use processor::{DefaultMetricsProcessor, MetricsProcessor};
pub use record::Metrics;
pub use store::{MemoryMetricsStore, MetricsStore, MetricsStoreRegistry, NoopMetricsStore};
pub use writer::{FileMetricsWriter, LogMetricsWriter, MetricsWriter};
