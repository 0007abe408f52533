//! Loading pipeline configuration from files.

use graphrag_llm::config::{CacheType, MetricsWriterType, RetryType};
use graphrag_llm::{Error, PipelineConfig};
use std::io::Write;

const YAML: &str = r#"
model:
  model_provider: azure
  model: gpt-4o-mini
  api_version: "2024-06-01"
  call_args:
    temperature: 0
cache:
  type: file
  base_dir: /tmp/graphrag-cache
  namespace: extract_graph
rate_limit:
  type: sliding_window
  period_in_seconds: 60
  requests_per_period: 500
  tokens_per_period: 50000
retry:
  type: exponential_backoff
  max_retries: 5
  base_delay: 2.0
  max_delay: 30
metrics:
  writer: log
  log_level: debug
model_costs:
  azure/gpt-4o-mini:
    input_cost_per_token: 0.00000015
    output_cost_per_token: 0.0000006
"#;

fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_yaml_file() {
    let file = write_temp(".yaml", YAML);
    let config = PipelineConfig::from_path(file.path()).unwrap();

    assert_eq!(config.model.id(), "azure/gpt-4o-mini");
    assert!(config.model.extra.contains_key("api_version"));
    assert_eq!(config.cache.as_ref().unwrap().cache_type, CacheType::File);
    let rl = config.rate_limit.as_ref().unwrap();
    assert_eq!(rl.requests_per_period, Some(500));
    assert_eq!(rl.tokens_per_period, Some(50_000));
    let retry = config.retry.as_ref().unwrap();
    assert_eq!(retry.retry_type, RetryType::ExponentialBackoff);
    assert_eq!(retry.max_retries, 5);
    assert!(retry.jitter);
    let metrics = config.metrics.as_ref().unwrap();
    assert_eq!(metrics.writer, Some(MetricsWriterType::Log));
    assert!(config.log_calls);
    assert_eq!(config.model_costs.len(), 1);
}

#[test]
fn test_load_json_file() {
    let json = r#"{
        "model": {"model_provider": "openai", "model": "text-embedding-3-small"},
        "cache": {"type": "memory"},
        "log_calls": false
    }"#;
    let file = write_temp(".json", json);
    let config = PipelineConfig::from_path(file.path()).unwrap();
    assert_eq!(config.model.model, "text-embedding-3-small");
    assert!(!config.log_calls);
    assert!(config.retry.is_none());
}

#[test]
fn test_invalid_values_are_rejected() {
    let yaml = r#"
model:
  model_provider: openai
  model: gpt-4o
retry:
  type: exponential_backoff
  max_retries: 0
"#;
    let err = PipelineConfig::from_yaml_str(yaml).err().unwrap();
    assert!(matches!(err, Error::Configuration { .. }));
}

#[test]
fn test_unknown_extension_is_rejected() {
    let file = write_temp(".toml", "model = 1");
    assert!(PipelineConfig::from_path(file.path()).is_err());
}
