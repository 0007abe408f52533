//! Strategy factories.
//!
//! Each factory maps a config `type` tag to a constructor. Built-in strategies
//! are registered up front; applications add their own with
//! [`Factory::register`] and select them with a `Custom` tag in config.

use crate::cache::{Cache, FileCache, MemoryCache, NoopCache};
use crate::config::{
    CacheConfig, CacheType, MetricsConfig, MetricsProcessorType, MetricsStoreType,
    MetricsWriterType, RateLimitConfig, RateLimitType, RetryConfig, RetryType,
};
use crate::metrics::{
    DefaultMetricsProcessor, FileMetricsWriter, LogMetricsWriter, MemoryMetricsStore,
    MetricsProcessor, MetricsStore, MetricsWriter, NoopMetricsStore,
};
use crate::resilience::{
    ExponentialBackoff, Immediate, RateLimiter, RetryPolicy, SlidingWindowRateLimiter,
};
use crate::tokens::ModelCostRegistry;
use crate::{Error, ErrorContext, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type Constructor<C, T> = Arc<dyn Fn(&C) -> Result<T> + Send + Sync>;

/// Registration map from type tag to constructor.
pub struct Factory<C, T> {
    kind: &'static str,
    constructors: RwLock<HashMap<String, Constructor<C, T>>>,
}

impl<C, T> Factory<C, T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) the constructor for `tag`.
    pub fn register<F>(&self, tag: impl Into<String>, constructor: F)
    where
        F: Fn(&C) -> Result<T> + Send + Sync + 'static,
    {
        self.constructors
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(tag.into(), Arc::new(constructor));
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.constructors
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(tag)
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .constructors
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect();
        tags.sort();
        tags
    }

    pub fn create(&self, tag: &str, config: &C) -> Result<T> {
        let constructor = self
            .constructors
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(tag)
            .cloned();
        match constructor {
            Some(c) => c(config),
            None => Err(Error::configuration_with_context(
                format!("unknown {} type '{}'", self.kind, tag),
                ErrorContext::new()
                    .with_details(format!("registered: {}", self.tags().join(", ")))
                    .with_source("factory"),
            )),
        }
    }
}

/// Inputs of a metrics store constructor.
#[derive(Clone)]
pub struct MetricsStoreParams {
    pub id: String,
    pub config: MetricsConfig,
    pub writer: Option<Arc<dyn MetricsWriter>>,
}

/// Inputs of a metrics processor constructor.
#[derive(Clone)]
pub struct MetricsProcessorParams {
    pub config: MetricsConfig,
    pub costs: Arc<ModelCostRegistry>,
}

/// The full set of strategy factories a pipeline is built from.
pub struct Factories {
    pub cache: Factory<CacheConfig, Arc<dyn Cache>>,
    pub rate_limiter: Factory<RateLimitConfig, Arc<dyn RateLimiter>>,
    pub retry: Factory<RetryConfig, Arc<dyn RetryPolicy>>,
    pub metrics_store: Factory<MetricsStoreParams, Arc<dyn MetricsStore>>,
    pub metrics_writer: Factory<MetricsConfig, Arc<dyn MetricsWriter>>,
    pub metrics_processor: Factory<MetricsProcessorParams, Arc<dyn MetricsProcessor>>,
}

static SHARED: Lazy<Arc<Factories>> = Lazy::new(|| Arc::new(Factories::with_builtins()));

impl Factories {
    pub fn empty() -> Self {
        Self {
            cache: Factory::new("cache"),
            rate_limiter: Factory::new("rate limiter"),
            retry: Factory::new("retry"),
            metrics_store: Factory::new("metrics store"),
            metrics_writer: Factory::new("metrics writer"),
            metrics_processor: Factory::new("metrics processor"),
        }
    }

    pub fn with_builtins() -> Self {
        let f = Self::empty();

        f.cache.register(CacheType::Memory.as_str(), |_| {
            Ok(Arc::new(MemoryCache::new()) as Arc<dyn Cache>)
        });
        f.cache.register(CacheType::Noop.as_str(), |_| {
            Ok(Arc::new(NoopCache::new()) as Arc<dyn Cache>)
        });
        f.cache.register(CacheType::File.as_str(), |c: &CacheConfig| {
            let dir = c.base_dir.clone().ok_or_else(|| {
                Error::configuration_with_context(
                    "file cache requires base_dir",
                    ErrorContext::new().with_field_path("cache.base_dir"),
                )
            })?;
            Ok(Arc::new(FileCache::new(dir)) as Arc<dyn Cache>)
        });

        f.rate_limiter
            .register(RateLimitType::SlidingWindow.as_str(), |c: &RateLimitConfig| {
                Ok(Arc::new(SlidingWindowRateLimiter::new(c)?) as Arc<dyn RateLimiter>)
            });

        f.retry
            .register(RetryType::ExponentialBackoff.as_str(), |c: &RetryConfig| {
                Ok(Arc::new(ExponentialBackoff::new(c)?) as Arc<dyn RetryPolicy>)
            });
        f.retry.register(RetryType::Immediate.as_str(), |c: &RetryConfig| {
            Ok(Arc::new(Immediate::new(c.max_retries)?) as Arc<dyn RetryPolicy>)
        });

        f.metrics_store
            .register(MetricsStoreType::Memory.as_str(), |s: &MetricsStoreParams| {
                let mut store = MemoryMetricsStore::new(s.id.clone());
                if let Some(w) = &s.writer {
                    store = store.with_writer(w.clone());
                }
                Ok(Arc::new(store) as Arc<dyn MetricsStore>)
            });
        f.metrics_store
            .register(MetricsStoreType::Noop.as_str(), |s: &MetricsStoreParams| {
                Ok(Arc::new(NoopMetricsStore::new(s.id.clone())) as Arc<dyn MetricsStore>)
            });

        f.metrics_writer
            .register(MetricsWriterType::Log.as_str(), |c: &MetricsConfig| {
                Ok(Arc::new(LogMetricsWriter::from_level_str(&c.log_level)?) as Arc<dyn MetricsWriter>)
            });
        f.metrics_writer
            .register(MetricsWriterType::File.as_str(), |c: &MetricsConfig| {
                let dir = c.base_dir.clone().ok_or_else(|| {
                    Error::configuration_with_context(
                        "file metrics writer requires base_dir",
                        ErrorContext::new().with_field_path("metrics.base_dir"),
                    )
                })?;
                Ok(Arc::new(FileMetricsWriter::new(dir)) as Arc<dyn MetricsWriter>)
            });

        f.metrics_processor.register(
            MetricsProcessorType::Default.as_str(),
            |s: &MetricsProcessorParams| {
                Ok(Arc::new(DefaultMetricsProcessor::new(s.costs.clone()))
                    as Arc<dyn MetricsProcessor>)
            },
        );

        f
    }

    /// Process-wide factories; custom registrations made here are visible to
    /// every pipeline built with [`LlmPipeline::from_config`](crate::middleware::LlmPipeline::from_config).
    pub fn shared() -> Arc<Factories> {
        SHARED.clone()
    }
}

impl Default for Factories {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let f = Factories::with_builtins();
        assert_eq!(f.cache.tags(), vec!["file", "memory", "noop"]);
        assert!(f.retry.is_registered("exponential_backoff"));
        assert!(f.retry.is_registered("immediate"));
        assert!(f.rate_limiter.is_registered("sliding_window"));
        assert!(f.metrics_writer.is_registered("log"));
    }

    #[test]
    fn test_unknown_tag_is_a_configuration_error() {
        let f = Factories::with_builtins();
        let err = f.cache.create("redis", &CacheConfig::default()).err().unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("redis"));
    }

    #[test]
    fn test_custom_registration() {
        let f = Factories::with_builtins();
        f.cache.register("scratch", |_| Ok(Arc::new(NoopCache::new()) as Arc<dyn Cache>));
        let cache = f.cache.create("scratch", &CacheConfig::default()).unwrap();
        assert_eq!(cache.name(), "noop");
    }

    #[test]
    fn test_constructors_validate_config() {
        let f = Factories::with_builtins();
        assert!(f.retry.create("exponential_backoff", &RetryConfig::exponential(0, 2.0, 30.0)).is_err());
        assert!(f.rate_limiter.create("sliding_window", &RateLimitConfig::new(1)).is_err());
        let policy = f.retry.create("immediate", &RetryConfig::immediate(2)).unwrap();
        assert_eq!(policy.max_retries(), 2);
    }
}
