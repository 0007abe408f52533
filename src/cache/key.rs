//! Cache key generation.

use crate::types::CallArgs;
use sha2::{Digest, Sha256};

/// Arguments that never change what the provider answers.
pub const NON_IDENTITY_ARGS: &[&str] = &["stream", "timeout", "api_key"];

/// Derive the cache key for a set of call arguments.
///
/// The key is the lowercase hex SHA-256 of the canonical JSON of the
/// arguments, so two argument sets that are equal by content always share a
/// key regardless of insertion order or source collection type.
pub fn create_cache_key(args: &CallArgs) -> String {
    let mut identity = args.clone();
    for key in NON_IDENTITY_ARGS {
        identity.remove(key);
    }
    let canonical = identity.to_canonical_json().to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Key generator with an optional prefix, used when several pipelines share
/// one cache namespace.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyGenerator {
    prefix: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn generate(&self, args: &CallArgs) -> String {
        let hash = create_cache_key(args);
        match &self.prefix {
            Some(p) => format!("{}_{}", p, hash),
            None => hash,
        }
    }
}
