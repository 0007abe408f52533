//! Metrics stores and the per-model store registry.

use super::record::Metrics;
use super::writer::MetricsWriter;
use crate::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::warn;

/// Accumulates metric deltas for one id (usually `provider/model`).
pub trait MetricsStore: Send + Sync {
    fn id(&self) -> &str;

    /// Merge `delta` into the running total.
    fn update_metrics(&self, delta: &Metrics) -> Result<()>;

    fn get_metrics(&self) -> Metrics;

    fn clear_metrics(&self);
}

/// In-process store, optionally forwarding each new total to a writer.
pub struct MemoryMetricsStore {
    id: String,
    metrics: Mutex<Metrics>,
    writer: Option<Arc<dyn MetricsWriter>>,
}

impl MemoryMetricsStore {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metrics: Mutex::new(Metrics::default()),
            writer: None,
        }
    }

    pub fn with_writer(mut self, writer: Arc<dyn MetricsWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Metrics> {
        self.metrics.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl MetricsStore for MemoryMetricsStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn update_metrics(&self, delta: &Metrics) -> Result<()> {
        let snapshot = {
            let mut total = self.lock();
            total.merge(delta);
            total.clone()
        };
        if let Some(writer) = &self.writer {
            if let Err(e) = writer.write_metrics(&self.id, &snapshot) {
                warn!(model_id = %self.id, writer = writer.name(), error = %e, "metrics write failed");
            }
        }
        Ok(())
    }

    fn get_metrics(&self) -> Metrics {
        self.lock().clone()
    }

    fn clear_metrics(&self) {
        *self.lock() = Metrics::default();
    }
}

/// Store that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoopMetricsStore {
    id: String,
}

impl NoopMetricsStore {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl MetricsStore for NoopMetricsStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn update_metrics(&self, _delta: &Metrics) -> Result<()> {
        Ok(())
    }

    fn get_metrics(&self) -> Metrics {
        Metrics::default()
    }

    fn clear_metrics(&self) {}
}

static SHARED: Lazy<Arc<MetricsStoreRegistry>> = Lazy::new(|| Arc::new(MetricsStoreRegistry::new()));

/// One store per id, so every pipeline calling the same model aggregates
/// into the same totals.
#[derive(Default)]
pub struct MetricsStoreRegistry {
    stores: RwLock<HashMap<String, Arc<dyn MetricsStore>>>,
}

impl MetricsStoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<MetricsStoreRegistry> {
        SHARED.clone()
    }

    /// Existing store for `id`, or the one `create` builds (which is then kept).
    pub fn get_or_create<F>(&self, id: &str, create: F) -> Result<Arc<dyn MetricsStore>>
    where
        F: FnOnce() -> Result<Arc<dyn MetricsStore>>,
    {
        if let Some(store) = self.get(id) {
            return Ok(store);
        }
        let mut stores = self.stores.write().unwrap_or_else(|p| p.into_inner());
        if let Some(store) = stores.get(id) {
            return Ok(store.clone());
        }
        let store = create()?;
        stores.insert(id.to_string(), store.clone());
        Ok(store)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn MetricsStore>> {
        self.stores
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<dyn MetricsStore>> {
        self.stores
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .stores
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
