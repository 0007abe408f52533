//! Token 计数与成本模块：估算调用的 Token 用量并按模型价格计算成本。
//!
//! # Token Counting and Cost Module
//!
//! Token estimates feed rate-limit admission before a call is made; the cost
//! registry turns the usage a provider reports into money afterwards.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TokenCounter`] | Trait for token counting implementations |
//! | [`CharacterEstimator`] | Character-based approximation (4 chars ≈ 1 token) |
//! | [`ModelCosts`] | Input/output price per token |
//! | [`ModelCostRegistry`] | Model id → costs, seeded with built-in prices |
//!
//! ## Example
//!
//! ```rust
//! use graphrag_llm::tokens::{CharacterEstimator, ModelCostRegistry, TokenCounter};
//!
//! let tokens = CharacterEstimator::new().count("Hello, how are you?");
//! let registry = ModelCostRegistry::new();
//! let costs = registry.get_model_costs("openai/gpt-4o").unwrap();
//! let estimate = costs.calculate_cost(tokens as u64, 100);
//! assert!(estimate.total_cost > 0.0);
//! ```

mod counter;
mod pricing;

pub use counter::{CharacterEstimator, TokenCounter};
pub use pricing::{CostEstimate, ModelCostRegistry, ModelCosts};
