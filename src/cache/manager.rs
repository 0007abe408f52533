//! Cache manager.

use super::backend::Cache;
use super::key::CacheKeyGenerator;
use crate::types::{CallArgs, ModelResponse};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Typed response cache on top of any [`Cache`] backend.
///
/// Backend and decoding failures are logged and counted, never returned: a
/// broken cache degrades to a miss.
#[derive(Clone)]
pub struct CacheManager {
    cache: Arc<dyn Cache>,
    keys: CacheKeyGenerator,
    stats: Arc<AtomicStats>,
}

impl CacheManager {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            keys: CacheKeyGenerator::new(),
            stats: Arc::new(AtomicStats::default()),
        }
    }

    pub fn with_key_generator(mut self, keys: CacheKeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    pub fn key_for(&self, args: &CallArgs) -> String {
        self.keys.generate(args)
    }

    pub fn get_response(&self, key: &str) -> Option<ModelResponse> {
        match self.cache.get(key) {
            Ok(Some(value)) => match serde_json::from_value::<ModelResponse>(value) {
                Ok(resp) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(cache_key = key, backend = self.cache.name(), "cache hit");
                    Some(resp)
                }
                Err(e) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(cache_key = key, error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!(cache_key = key, backend = self.cache.name(), "cache miss");
                None
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(cache_key = key, error = %e, "cache read failed");
                None
            }
        }
    }

    pub fn set_response(&self, key: &str, response: &ModelResponse, debug_data: Option<serde_json::Value>) {
        let value = match serde_json::to_value(response) {
            Ok(v) => v,
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(cache_key = key, error = %e, "response not serializable, skipping cache write");
                return;
            }
        };
        match self.cache.set(key, value, debug_data) {
            Ok(()) => {
                self.stats.sets.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(cache_key = key, error = %e, "cache write failed");
            }
        }
    }

    /// [`get_response`](Self::get_response) for async callers. Blocking
    /// backends are read on the blocking thread pool.
    pub async fn get_response_async(&self, key: &str) -> Option<ModelResponse> {
        if !self.cache.blocking_io() {
            return self.get_response(key);
        }
        let this = self.clone();
        let key = key.to_string();
        match tokio::task::spawn_blocking(move || this.get_response(&key)).await {
            Ok(hit) => hit,
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "cache read task failed");
                None
            }
        }
    }

    /// [`set_response`](Self::set_response) for async callers. Blocking
    /// backends are written on the blocking thread pool.
    pub async fn set_response_async(
        &self,
        key: &str,
        response: &ModelResponse,
        debug_data: Option<serde_json::Value>,
    ) {
        if !self.cache.blocking_io() {
            return self.set_response(key, response, debug_data);
        }
        let this = self.clone();
        let key = key.to_string();
        let response = response.clone();
        if let Err(e) =
            tokio::task::spawn_blocking(move || this.set_response(&key, &response, debug_data)).await
        {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "cache write task failed");
        }
    }

    /// Manager over a child namespace; statistics are shared with the parent.
    pub fn child(&self, name: &str) -> CacheManager {
        Self {
            cache: self.cache.child(name),
            keys: self.keys.clone(),
            stats: self.stats.clone(),
        }
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.cache.name()
    }
}
