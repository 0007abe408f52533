//! Model cost registry.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Per-token prices in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCosts {
    pub input_cost_per_token: f64,
    pub output_cost_per_token: f64,
}

impl ModelCosts {
    pub fn new(input_cost_per_token: f64, output_cost_per_token: f64) -> Self {
        Self {
            input_cost_per_token,
            output_cost_per_token,
        }
    }

    pub fn calculate_cost(&self, prompt_tokens: u64, completion_tokens: u64) -> CostEstimate {
        let input_cost = prompt_tokens as f64 * self.input_cost_per_token;
        let output_cost = completion_tokens as f64 * self.output_cost_per_token;
        CostEstimate {
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

const BUILTIN_COSTS: &[(&str, f64, f64)] = &[
    ("openai/gpt-4o", 2.5e-6, 1.0e-5),
    ("openai/gpt-4o-mini", 1.5e-7, 6.0e-7),
    ("openai/gpt-4.1", 2.0e-6, 8.0e-6),
    ("openai/gpt-4.1-mini", 4.0e-7, 1.6e-6),
    ("openai/text-embedding-3-small", 2.0e-8, 0.0),
    ("openai/text-embedding-3-large", 1.3e-7, 0.0),
    ("anthropic/claude-3-5-sonnet", 3.0e-6, 1.5e-5),
    ("anthropic/claude-3-haiku", 2.5e-7, 1.25e-6),
];

static SHARED: Lazy<Arc<ModelCostRegistry>> = Lazy::new(|| Arc::new(ModelCostRegistry::new()));

/// Lookup table from model id to per-token cost.
///
/// Ids are `provider/model`. A lookup that misses on the full id retries with
/// the bare model name, so `azure/gpt-4o` resolves through a `gpt-4o` entry.
#[derive(Debug)]
pub struct ModelCostRegistry {
    costs: RwLock<HashMap<String, ModelCosts>>,
}

impl ModelCostRegistry {
    /// Registry seeded with the built-in price table.
    pub fn new() -> Self {
        let mut costs = HashMap::new();
        for (id, input, output) in BUILTIN_COSTS {
            let c = ModelCosts::new(*input, *output);
            costs.insert(id.to_string(), c);
            if let Some((_, bare)) = id.split_once('/') {
                costs.entry(bare.to_string()).or_insert(c);
            }
        }
        Self {
            costs: RwLock::new(costs),
        }
    }

    pub fn empty() -> Self {
        Self {
            costs: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide registry for callers that do not inject their own.
    pub fn shared() -> Arc<ModelCostRegistry> {
        SHARED.clone()
    }

    /// Insert or overwrite the costs of a model.
    pub fn register_model_costs(&self, model_id: impl Into<String>, costs: ModelCosts) {
        let mut map = self.costs.write().unwrap_or_else(|p| p.into_inner());
        map.insert(model_id.into(), costs);
    }

    pub fn get_model_costs(&self, model_id: &str) -> Option<ModelCosts> {
        let map = self.costs.read().unwrap_or_else(|p| p.into_inner());
        map.get(model_id).copied().or_else(|| {
            model_id
                .split_once('/')
                .and_then(|(_, bare)| map.get(bare).copied())
        })
    }

    pub fn len(&self) -> usize {
        self.costs.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ModelCostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_is_seeded() {
        let registry = ModelCostRegistry::new();
        let c = registry.get_model_costs("openai/gpt-4o").unwrap();
        assert_eq!(c.input_cost_per_token, 2.5e-6);
        assert_eq!(registry.get_model_costs("gpt-4o"), Some(c));
    }

    #[test]
    fn test_unknown_model_has_no_cost() {
        let registry = ModelCostRegistry::new();
        assert_eq!(registry.get_model_costs("acme/unknown-model"), None);
        assert!(ModelCostRegistry::empty().get_model_costs("openai/gpt-4o").is_none());
    }

    #[test]
    fn test_bare_name_fallback() {
        let registry = ModelCostRegistry::new();
        assert!(registry.get_model_costs("azure/gpt-4o-mini").is_some());
    }

    #[test]
    fn test_last_write_wins() {
        let registry = ModelCostRegistry::empty();
        registry.register_model_costs("acme/m", ModelCosts::new(1.0, 2.0));
        registry.register_model_costs("acme/m", ModelCosts::new(3.0, 4.0));
        assert_eq!(registry.get_model_costs("acme/m"), Some(ModelCosts::new(3.0, 4.0)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_calculate_cost() {
        let est = ModelCosts::new(1e-6, 2e-6).calculate_cost(1000, 500);
        assert!((est.input_cost - 0.001).abs() < 1e-12);
        assert!((est.output_cost - 0.001).abs() < 1e-12);
        assert!((est.total_cost - 0.002).abs() < 1e-12);
    }
}
