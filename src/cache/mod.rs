//! 响应缓存模块：提供可插拔的缓存后端以避免重复的模型调用。
//!
//! # Response Caching Module
//!
//! Content-addressed caching of provider responses. Identical call arguments
//! (by content, not by construction order) map to the same key, so a repeated
//! call is answered without reaching the provider.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Cache`] | Trait for cache backends with child namespaces |
//! | [`MemoryCache`] | Process-local map backend |
//! | [`FileCache`] | One JSON file per entry under a directory |
//! | [`NoopCache`] | Backend that stores nothing |
//! | [`CacheManager`] | Typed response access with hit/miss statistics |
//! | [`create_cache_key`] | SHA-256 key over the canonical call arguments |
//!
//! ## Example
//!
//! ```rust
//! use graphrag_llm::cache::{create_cache_key, Cache, MemoryCache};
//! use graphrag_llm::types::CallArgs;
//!
//! let cache = MemoryCache::new();
//! let args = CallArgs::new().with_model("gpt-4o").with("prompt", "hello");
//! let key = create_cache_key(&args);
//! cache.set(&key, serde_json::json!({"content": "hi"}), None).unwrap();
//! assert!(cache.has(&key).unwrap());
//! ```
//!
//! ## Key Derivation
//!
//! Arguments that never change the answer (`stream`, `timeout`, `api_key`)
//! are excluded from the key. Sets are sorted before hashing; sequences keep
//! their order.

mod backend;
mod file;
mod key;
mod manager;

pub use backend::{Cache, MemoryCache, NoopCache};
pub use file::FileCache;
pub use key::{create_cache_key, CacheKeyGenerator, NON_IDENTITY_ARGS};
pub use manager::{CacheManager, CacheStats};
