//! Turns provider responses into metric deltas.

use super::record::Metrics;
use crate::config::ModelConfig;
use crate::tokens::ModelCostRegistry;
use crate::types::{CallArgs, CompletionChunk, CompletionResponse, ModelResponse, Usage};
use std::sync::Arc;
use tracing::debug;

pub trait MetricsProcessor: Send + Sync {
    /// Record a buffered response into `metrics`.
    fn process_response(
        &self,
        model: &ModelConfig,
        args: &CallArgs,
        response: &ModelResponse,
        metrics: &mut Metrics,
    );

    /// Record a completed chunk sequence; usage is summed across chunks.
    fn process_stream(
        &self,
        model: &ModelConfig,
        args: &CallArgs,
        chunks: &[CompletionChunk],
        metrics: &mut Metrics,
    ) {
        let response = ModelResponse::from(CompletionResponse::from_chunks(chunks));
        self.process_response(model, args, &response, metrics);
        metrics.streaming_responses += 1;
    }

    fn name(&self) -> &'static str;
}

/// Counts the response as successful and prices its usage through a
/// [`ModelCostRegistry`]. Models without a registered cost record tokens only.
pub struct DefaultMetricsProcessor {
    costs: Arc<ModelCostRegistry>,
}

impl DefaultMetricsProcessor {
    pub fn new(costs: Arc<ModelCostRegistry>) -> Self {
        Self { costs }
    }

    /// Cost lookup id: the model the call actually asked for, under the
    /// configured provider.
    fn cost_id(model: &ModelConfig, args: &CallArgs) -> String {
        match args.model() {
            Some(m) if m.contains('/') => m.to_string(),
            Some(m) => format!("{}/{}", model.model_provider, m),
            None => model.id(),
        }
    }

    fn record_usage(&self, id: &str, usage: &Usage, metrics: &mut Metrics) {
        metrics.prompt_tokens += usage.prompt_tokens;
        metrics.completion_tokens += usage.completion_tokens;
        metrics.total_tokens += usage.total_tokens;
        match self.costs.get_model_costs(id) {
            Some(costs) => {
                let est = costs.calculate_cost(usage.prompt_tokens, usage.completion_tokens);
                metrics.input_cost += est.input_cost;
                metrics.output_cost += est.output_cost;
                metrics.total_cost += est.total_cost;
            }
            None => debug!(model_id = id, "no cost registered for model"),
        }
    }
}

impl MetricsProcessor for DefaultMetricsProcessor {
    fn process_response(
        &self,
        model: &ModelConfig,
        args: &CallArgs,
        response: &ModelResponse,
        metrics: &mut Metrics,
    ) {
        metrics.successful_response_count += 1;
        if let Some(usage) = response.usage() {
            self.record_usage(&Self::cost_id(model, args), usage, metrics);
        }
    }

    fn name(&self) -> &'static str {
        "default"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::ModelCosts;
    use crate::types::EmbeddingResponse;

    fn processor() -> DefaultMetricsProcessor {
        let costs = ModelCostRegistry::empty();
        costs.register_model_costs("openai/gpt-4o", ModelCosts::new(1e-6, 2e-6));
        costs.register_model_costs("openai/embed", ModelCosts::new(1e-7, 0.0));
        DefaultMetricsProcessor::new(Arc::new(costs))
    }

    #[test]
    fn test_completion_usage_and_cost() {
        let model = ModelConfig::new("openai", "gpt-4o");
        let resp: ModelResponse = CompletionResponse::new("gpt-4o", "hi")
            .with_usage(Usage::new(1000, 500))
            .into();
        let mut m = Metrics::default();
        processor().process_response(&model, &CallArgs::new(), &resp, &mut m);
        assert_eq!(m.successful_response_count, 1);
        assert_eq!(m.total_tokens, 1500);
        assert!((m.input_cost - 0.001).abs() < 1e-12);
        assert!((m.output_cost - 0.001).abs() < 1e-12);
        assert!((m.total_cost - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_embedding_and_unknown_model() {
        let model = ModelConfig::new("openai", "embed");
        let resp: ModelResponse = EmbeddingResponse {
            model: "embed".into(),
            data: vec![vec![0.1, 0.2]],
            usage: Some(Usage::new(100, 0)),
        }
        .into();
        let mut m = Metrics::default();
        processor().process_response(&model, &CallArgs::new(), &resp, &mut m);
        assert!((m.input_cost - 1e-5).abs() < 1e-15);

        let unknown = ModelConfig::new("acme", "mystery");
        let mut m = Metrics::default();
        processor().process_response(&unknown, &CallArgs::new(), &resp, &mut m);
        assert_eq!(m.prompt_tokens, 100);
        assert_eq!(m.total_cost, 0.0);
    }

    #[test]
    fn test_stream_usage_is_summed() {
        let model = ModelConfig::new("openai", "gpt-4o");
        let chunks = vec![
            CompletionChunk::text("a").with_usage(Usage::new(10, 1)),
            CompletionChunk::text("b").with_usage(Usage::new(0, 2)),
            CompletionChunk::text("c"),
        ];
        let mut m = Metrics::default();
        processor().process_stream(&model, &CallArgs::new(), &chunks, &mut m);
        assert_eq!(m.prompt_tokens, 10);
        assert_eq!(m.completion_tokens, 3);
        assert_eq!(m.streaming_responses, 1);
        assert_eq!(m.successful_response_count, 1);
    }

    #[test]
    fn test_call_model_overrides_config_model() {
        let model = ModelConfig::new("openai", "gpt-4o-mini");
        let args = CallArgs::new().with_model("gpt-4o");
        assert_eq!(DefaultMetricsProcessor::cost_id(&model, &args), "openai/gpt-4o");
    }
}
