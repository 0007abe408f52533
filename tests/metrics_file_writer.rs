//! Metrics written to disk by a pipeline configured with the file writer.

use graphrag_llm::factory::Factories;
use graphrag_llm::metrics::MetricsStoreRegistry;
use graphrag_llm::tokens::ModelCostRegistry;
use graphrag_llm::types::{AsyncOutput, CallArgs, CompletionResponse, LlmOutput, LlmRequest, SyncOutput, Usage};
use graphrag_llm::{CallFns, Error, LlmPipeline, MetricsConfig, ModelConfig, PipelineConfig, Result};
use graphrag_llm::config::MetricsWriterType;
use std::sync::Arc;

fn answer() -> CompletionResponse {
    CompletionResponse::new("gpt-4o", "done").with_usage(Usage::new(7, 3))
}

#[test]
fn test_each_update_appends_a_json_line() {
    let dir = tempfile::tempdir().unwrap();
    let metrics = MetricsConfig {
        writer: Some(MetricsWriterType::File),
        base_dir: Some(dir.path().to_path_buf()),
        ..MetricsConfig::default()
    };
    let config = PipelineConfig::new(ModelConfig::new("openai", "gpt-4o")).with_metrics(metrics);
    let base = CallFns::new(
        |_req: LlmRequest| -> Result<SyncOutput> { Ok(LlmOutput::Response(answer().into())) },
        |_req: LlmRequest| async { Ok::<AsyncOutput, Error>(LlmOutput::Response(answer().into())) },
    );
    let pipeline = LlmPipeline::from_config_with(
        &config,
        base,
        &Factories::with_builtins(),
        Arc::new(ModelCostRegistry::new()),
        &MetricsStoreRegistry::new(),
    )
    .unwrap();

    pipeline.complete(CallArgs::new().with("prompt", "a")).unwrap();
    pipeline.complete(CallArgs::new().with("prompt", "b")).unwrap();

    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
    let content = std::fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["id"], "openai/gpt-4o");
    assert_eq!(lines[1]["metrics"]["successful_response_count"], 2);
    assert_eq!(lines[1]["metrics"]["total_tokens"], 20);
}
