//! Resilient pipeline demo
//!
//! Wraps a simulated provider (fails twice with 503, then answers) in the full
//! middleware stack configured from YAML, and shows retries, cache hits and
//! aggregated metrics on both the blocking and async entry points.
//!
//! Usage:
//!   RUST_LOG=graphrag_llm=debug cargo run --example resilient_pipeline

use async_trait::async_trait;
use graphrag_llm::logging::init_tracing;
use graphrag_llm::types::{AsyncOutput, CompletionResponse, LlmOutput, SyncOutput, Usage};
use graphrag_llm::{
    CallArgs, CallFns, Error, LlmPipeline, LlmProvider, LlmRequest, Message, PipelineConfig,
    ProviderErrorKind, Result,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const CONFIG: &str = r#"
model:
  model_provider: openai
  model: gpt-4o-mini
  call_args:
    temperature: 0
cache:
  type: memory
  namespace: demo
rate_limit:
  type: sliding_window
  period_in_seconds: 60
  requests_per_period: 100
  tokens_per_period: 100000
retry:
  type: exponential_backoff
  max_retries: 4
  base_delay: 1.5
  max_delay: 10
metrics:
  writer: log
"#;

/// Provider that is briefly overloaded.
struct FlakyProvider {
    calls: AtomicU32,
}

impl FlakyProvider {
    fn answer(&self, request: &LlmRequest) -> Result<CompletionResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            return Err(Error::provider(ProviderErrorKind::ServiceUnavailable, "model overloaded"));
        }
        let prompt = request.args.prompt_text().join(" ");
        Ok(CompletionResponse::new("gpt-4o-mini", format!("summary of: {prompt}"))
            .with_usage(Usage::new(prompt.len() as u64 / 4, 12)))
    }
}

#[async_trait]
impl LlmProvider for FlakyProvider {
    fn call(&self, request: LlmRequest) -> Result<SyncOutput> {
        Ok(LlmOutput::Response(self.answer(&request)?.into()))
    }

    async fn call_async(&self, request: LlmRequest) -> Result<AsyncOutput> {
        Ok(LlmOutput::Response(self.answer(&request)?.into()))
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_tracing("graphrag_llm=info");

    let config = PipelineConfig::from_yaml_str(CONFIG)?;
    let provider = Arc::new(FlakyProvider {
        calls: AtomicU32::new(0),
    });
    let pipeline = LlmPipeline::from_config(&config, CallFns::from_provider(provider))?;

    let args = || {
        CallArgs::new().with_messages(&[
            Message::system("Summarize the community report."),
            Message::user("Alice and Bob co-founded Acme in 1999."),
        ])
    };

    println!("first call (retries through two 503s)...");
    let first = pipeline.complete_async(args()).await?;
    println!("  -> {:?}", first.content());

    println!("second call, blocking entry point (served from cache)...");
    let blocking = pipeline.clone();
    let second = tokio::task::spawn_blocking(move || blocking.complete(args())).await??;
    println!("  -> {:?}", second.content());

    let m = pipeline.metrics();
    println!("\nmetrics for {}:", pipeline.model().id());
    println!("  attempted:  {}", m.attempted_request_count);
    println!("  succeeded:  {}", m.successful_response_count);
    println!("  failed:     {}", m.failed_response_count);
    println!("  retries:    {}", m.retries);
    println!("  cache hits: {}", m.cached_responses);
    println!("  tokens:     {}", m.total_tokens);
    println!("  cost:       ${:.6}", m.total_cost);
    if let Some(stats) = pipeline.cache_stats() {
        println!("  cache hit ratio: {:.2}", stats.hit_ratio());
    }

    Ok(())
}
