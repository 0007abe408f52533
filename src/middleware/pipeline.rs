//! Composition root: builds the layer stack from a [`PipelineConfig`].

use super::{with_middleware, CallFns, MiddlewareLayers};
use crate::cache::{CacheManager, CacheStats};
use crate::config::{MetricsConfig, ModelConfig, PipelineConfig};
use crate::factory::{Factories, MetricsProcessorParams, MetricsStoreParams};
use crate::metrics::{Metrics, MetricsStore, MetricsStoreRegistry};
use crate::resilience::Retrier;
use crate::tokens::{CharacterEstimator, ModelCostRegistry};
use crate::types::{AsyncOutput, CallArgs, LlmRequest, ModelResponse, SyncOutput};
use crate::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A model call wrapped in the configured resilience layers.
///
/// Cheap to clone; clones share cache, limiter, retry policy and metrics.
#[derive(Clone)]
pub struct LlmPipeline {
    model: ModelConfig,
    fns: CallFns,
    cache: Option<CacheManager>,
    metrics_store: Option<Arc<dyn MetricsStore>>,
}

impl LlmPipeline {
    /// Build from config with the process-wide factories, cost registry and
    /// metrics store registry.
    pub fn from_config(config: &PipelineConfig, base: CallFns) -> Result<Self> {
        Self::from_config_with(
            config,
            base,
            &Factories::shared(),
            ModelCostRegistry::shared(),
            &MetricsStoreRegistry::shared(),
        )
    }

    pub fn from_config_with(
        config: &PipelineConfig,
        base: CallFns,
        factories: &Factories,
        costs: Arc<ModelCostRegistry>,
        stores: &MetricsStoreRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let model_id = config.model.id();

        for (id, model_costs) in &config.model_costs {
            costs.register_model_costs(id.clone(), *model_costs);
        }

        let mut layers = MiddlewareLayers::new(config.model.clone());
        layers.log_calls = config.log_calls;
        layers.count_requests = config.count_requests;

        if let Some(cache_cfg) = &config.cache {
            let backend = factories.cache.create(cache_cfg.cache_type.as_str(), cache_cfg)?;
            let mut manager = CacheManager::new(backend);
            if let Some(ns) = &cache_cfg.namespace {
                manager = manager.child(ns);
            }
            debug!(model_id = %model_id, backend = manager.backend_name(), "cache layer enabled");
            layers = layers.with_cache(manager);
        }

        if let Some(rl_cfg) = &config.rate_limit {
            let limiter = factories.rate_limiter.create(rl_cfg.limiter_type.as_str(), rl_cfg)?;
            debug!(model_id = %model_id, limiter = limiter.name(), "rate limit layer enabled");
            layers = layers.with_rate_limit(limiter, Arc::new(CharacterEstimator::new()));
        }

        if let Some(retry_cfg) = &config.retry {
            let policy = factories.retry.create(retry_cfg.retry_type.as_str(), retry_cfg)?;
            debug!(model_id = %model_id, policy = policy.name(), max_retries = policy.max_retries(), "retry layer enabled");
            layers = layers.with_retry(Retrier::new(policy));
        }

        if let Some(metrics_cfg) = &config.metrics {
            let store = Self::metrics_store(&model_id, metrics_cfg, factories, stores)?;
            let processor = factories.metrics_processor.create(
                metrics_cfg.processor.as_str(),
                &MetricsProcessorParams {
                    config: metrics_cfg.clone(),
                    costs: costs.clone(),
                },
            )?;
            layers = layers.with_metrics(store, processor);
        }

        info!(
            model_id = %model_id,
            cache = layers.cache.is_some(),
            rate_limit = layers.rate_limit.is_some(),
            retry = layers.retry.is_some(),
            metrics = layers.metrics.is_some(),
            "llm pipeline built"
        );
        Ok(Self::new(base, layers))
    }

    fn metrics_store(
        model_id: &str,
        config: &MetricsConfig,
        factories: &Factories,
        stores: &MetricsStoreRegistry,
    ) -> Result<Arc<dyn MetricsStore>> {
        stores.get_or_create(model_id, || {
            let writer = match &config.writer {
                Some(tag) => Some(factories.metrics_writer.create(tag.as_str(), config)?),
                None => None,
            };
            factories.metrics_store.create(
                config.store.as_str(),
                &MetricsStoreParams {
                    id: model_id.to_string(),
                    config: config.clone(),
                    writer,
                },
            )
        })
    }

    /// Wrap `base` in explicitly constructed layers.
    pub fn new(base: CallFns, layers: MiddlewareLayers) -> Self {
        let fns = with_middleware(base, &layers);
        Self {
            model: layers.model,
            fns,
            cache: layers.cache,
            metrics_store: layers.metrics.map(|m| m.store),
        }
    }

    /// Fill in the configured model and default call arguments the caller left out.
    fn prepare(&self, mut args: CallArgs) -> CallArgs {
        if args.get("model").is_none() {
            args.insert("model", self.model.model.as_str());
        }
        for (key, value) in &self.model.call_args {
            if args.get(key).is_none() {
                args.insert(key.as_str(), value.clone());
            }
        }
        args
    }

    pub fn call(&self, args: CallArgs) -> Result<SyncOutput> {
        self.call_with_cancel(args, CancellationToken::new())
    }

    pub fn call_with_cancel(&self, args: CallArgs, cancel: CancellationToken) -> Result<SyncOutput> {
        self.fns.call(LlmRequest::new(self.prepare(args)).with_cancel(cancel))
    }

    pub async fn call_async(&self, args: CallArgs) -> Result<AsyncOutput> {
        self.call_async_with_cancel(args, CancellationToken::new()).await
    }

    pub async fn call_async_with_cancel(
        &self,
        args: CallArgs,
        cancel: CancellationToken,
    ) -> Result<AsyncOutput> {
        self.fns
            .call_async(LlmRequest::new(self.prepare(args)).with_cancel(cancel))
            .await
    }

    /// Call and collect a streamed answer into a buffered response.
    pub fn complete(&self, args: CallArgs) -> Result<ModelResponse> {
        self.call(args)?.into_response()
    }

    pub async fn complete_async(&self, args: CallArgs) -> Result<ModelResponse> {
        self.call_async(args).await?.into_response().await
    }

    /// Totals of this model's metrics store; empty when metrics are off.
    pub fn metrics(&self) -> Metrics {
        self.metrics_store
            .as_ref()
            .map(|s| s.get_metrics())
            .unwrap_or_default()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub fn fns(&self) -> &CallFns {
        &self.fns
    }
}
