//! Cache backend implementations.

use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Content-addressed store with hierarchical child namespaces.
///
/// Every method is safe to call concurrently. A `set` followed by `get` on the
/// same key from the same caller observes the written value.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value, debug_data: Option<Value>) -> Result<()>;
    fn has(&self, key: &str) -> Result<bool>;
    fn delete(&self, key: &str) -> Result<()>;
    /// Remove every entry in this namespace and below it.
    fn clear(&self) -> Result<()>;
    /// Sub-namespace scoped to `name`. Repeated calls address the same namespace.
    fn child(&self, name: &str) -> Arc<dyn Cache>;
    fn name(&self) -> &'static str;

    /// True when calls block on I/O and must be kept off async worker threads.
    fn blocking_io(&self) -> bool {
        false
    }
}

const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Clone)]
struct CacheEntry {
    value: Value,
    debug_data: Option<Value>,
}

type Entries = Arc<RwLock<HashMap<String, CacheEntry>>>;

/// Map-backed cache living for the lifetime of the process.
///
/// Children share the parent's map; their entries are kept apart by a
/// namespace prefix on the stored key. Each path segment is written as
/// `<byte length>:<name>/`, so one namespace is a prefix of another only when
/// it is an ancestor.
#[derive(Clone)]
pub struct MemoryCache {
    namespace: String,
    entries: Entries,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            namespace: String::new(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Number of entries in this namespace, excluding children.
    pub fn len(&self) -> Result<usize> {
        let own = self.own_prefix();
        Ok(self
            .read()?
            .keys()
            .filter(|k| k.starts_with(&own))
            .count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Debug metadata stored alongside an entry.
    pub fn debug_data(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .read()?
            .get(&self.storage_key(key))
            .and_then(|e| e.debug_data.clone()))
    }

    fn own_prefix(&self) -> String {
        format!("{}{}", self.namespace, KEY_SEPARATOR)
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}{}", self.namespace, KEY_SEPARATOR, key)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> Error {
    Error::cache_with_context(
        "memory cache lock poisoned",
        ErrorContext::new().with_source("memory_cache"),
    )
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .read()?
            .get(&self.storage_key(key))
            .map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: Value, debug_data: Option<Value>) -> Result<()> {
        let entry = CacheEntry { value, debug_data };
        self.write()?.insert(self.storage_key(key), entry);
        Ok(())
    }

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(&self.storage_key(key)))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.write()?.remove(&self.storage_key(key));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.write()?;
        if self.namespace.is_empty() {
            entries.clear();
            return Ok(());
        }
        entries.retain(|k, _| !k.starts_with(&self.namespace));
        Ok(())
    }

    fn child(&self, name: &str) -> Arc<dyn Cache> {
        let namespace = format!("{}{}:{}/", self.namespace, name.len(), name);
        Arc::new(MemoryCache {
            namespace,
            entries: self.entries.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Cache that stores nothing; used to disable caching without branching.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    pub fn new() -> Self {
        Self
    }
}

impl Cache for NoopCache {
    fn get(&self, _: &str) -> Result<Option<Value>> {
        Ok(None)
    }
    fn set(&self, _: &str, _: Value, _: Option<Value>) -> Result<()> {
        Ok(())
    }
    fn has(&self, _: &str) -> Result<bool> {
        Ok(false)
    }
    fn delete(&self, _: &str) -> Result<()> {
        Ok(())
    }
    fn clear(&self) -> Result<()> {
        Ok(())
    }
    fn child(&self, _: &str) -> Arc<dyn Cache> {
        Arc::new(*self)
    }
    fn name(&self) -> &'static str {
        "noop"
    }
}
