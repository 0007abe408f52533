//! Pipeline configuration.
//!
//! Every section deserializes from YAML or JSON. Strategy sections carry a
//! `type` tag naming a built-in or a custom factory registration; fields a
//! section does not recognize are kept in its `extra` map so custom strategies
//! can read them.

use crate::tokens::ModelCosts;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub type ExtraFields = BTreeMap<String, serde_json::Value>;

macro_rules! strategy_tag {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $tag:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Custom(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $tag,)+
                    $name::Custom(tag) => tag,
                }
            }
        }

        impl From<String> for $name {
            fn from(tag: String) -> Self {
                match tag.as_str() {
                    $($tag => $name::$variant,)+
                    _ => $name::Custom(tag),
                }
            }
        }

        impl From<&str> for $name {
            fn from(tag: &str) -> Self {
                Self::from(tag.to_string())
            }
        }

        impl From<$name> for String {
            fn from(tag: $name) -> Self {
                tag.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

strategy_tag!(
    /// Cache backend selector.
    CacheType { Memory => "memory", File => "file", Noop => "noop" }
);

strategy_tag!(
    /// Rate limiter selector.
    RateLimitType { SlidingWindow => "sliding_window" }
);

strategy_tag!(
    /// Retry policy selector.
    RetryType { ExponentialBackoff => "exponential_backoff", Immediate => "immediate" }
);

strategy_tag!(
    /// Metrics store selector.
    MetricsStoreType { Memory => "memory", Noop => "noop" }
);

strategy_tag!(
    /// Metrics writer selector.
    MetricsWriterType { Log => "log", File => "file" }
);

strategy_tag!(
    /// Metrics processor selector.
    MetricsProcessorType { Default => "default" }
);

fn invalid(field: &str, message: impl Into<String>) -> Error {
    Error::configuration_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field.to_string())
            .with_source("pipeline_config"),
    )
}

/// The model a pipeline calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_provider: String,
    pub model: String,
    /// Arguments merged into every call unless the call sets them itself.
    #[serde(default)]
    pub call_args: BTreeMap<String, serde_json::Value>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ModelConfig {
    pub fn new(model_provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model_provider: model_provider.into(),
            model: model.into(),
            call_args: BTreeMap::new(),
            extra: ExtraFields::new(),
        }
    }

    /// `provider/model`, the key used for costs and metrics.
    pub fn id(&self) -> String {
        format!("{}/{}", self.model_provider, self.model)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_provider.trim().is_empty() {
            return Err(invalid("model.model_provider", "model provider must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(invalid("model.model", "model name must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(rename = "type", default = "default_cache_type")]
    pub cache_type: CacheType,
    /// Root directory of a file cache.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    /// Child namespace the pipeline writes under.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

fn default_cache_type() -> CacheType {
    CacheType::Memory
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: default_cache_type(),
            base_dir: None,
            namespace: None,
            extra: ExtraFields::new(),
        }
    }
}

impl CacheConfig {
    pub fn file(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_type: CacheType::File,
            base_dir: Some(base_dir.into()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_type == CacheType::File && self.base_dir.is_none() {
            return Err(invalid("cache.base_dir", "file cache requires base_dir"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(rename = "type", default = "default_rate_limit_type")]
    pub limiter_type: RateLimitType,
    #[serde(default = "default_period")]
    pub period_in_seconds: u64,
    #[serde(default)]
    pub requests_per_period: Option<u64>,
    #[serde(default)]
    pub tokens_per_period: Option<u64>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

fn default_rate_limit_type() -> RateLimitType {
    RateLimitType::SlidingWindow
}

fn default_period() -> u64 {
    60
}

impl RateLimitConfig {
    pub fn new(period_in_seconds: u64) -> Self {
        Self {
            limiter_type: default_rate_limit_type(),
            period_in_seconds,
            requests_per_period: None,
            tokens_per_period: None,
            extra: ExtraFields::new(),
        }
    }

    pub fn with_requests_per_period(mut self, n: u64) -> Self {
        self.requests_per_period = Some(n);
        self
    }

    pub fn with_tokens_per_period(mut self, n: u64) -> Self {
        self.tokens_per_period = Some(n);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.period_in_seconds == 0 {
            return Err(invalid(
                "rate_limit.period_in_seconds",
                "period_in_seconds must be a positive integer",
            ));
        }
        if self.requests_per_period.is_none() && self.tokens_per_period.is_none() {
            return Err(invalid(
                "rate_limit",
                "at least one of requests_per_period or tokens_per_period must be set",
            ));
        }
        if self.requests_per_period == Some(0) {
            return Err(invalid(
                "rate_limit.requests_per_period",
                "requests_per_period must be a positive integer",
            ));
        }
        if self.tokens_per_period == Some(0) {
            return Err(invalid(
                "rate_limit.tokens_per_period",
                "tokens_per_period must be a positive integer",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "type", default = "default_retry_type")]
    pub retry_type: RetryType,
    /// Total attempts, the first call included.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Seconds; grows by powers of two from the second attempt.
    #[serde(default = "default_base_delay")]
    pub base_delay: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

fn default_retry_type() -> RetryType {
    RetryType::ExponentialBackoff
}

fn default_max_retries() -> u32 {
    7
}

fn default_base_delay() -> f64 {
    2.0
}

fn default_max_delay() -> f64 {
    60.0
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_type: default_retry_type(),
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            jitter: default_jitter(),
            extra: ExtraFields::new(),
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32, base_delay: f64, max_delay: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            ..Default::default()
        }
    }

    pub fn immediate(max_retries: u32) -> Self {
        Self {
            retry_type: RetryType::Immediate,
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries <= 1 {
            return Err(invalid("retry.max_retries", "max_retries must be greater than 1"));
        }
        if self.retry_type == RetryType::ExponentialBackoff {
            if !(self.base_delay.is_finite() && self.base_delay > 1.0) {
                return Err(invalid("retry.base_delay", "base_delay must be greater than 1.0"));
            }
            if !(self.max_delay.is_finite() && self.max_delay > 1.0) {
                return Err(invalid("retry.max_delay", "max_delay must be greater than 1.0"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_store_type")]
    pub store: MetricsStoreType,
    /// Writer receiving the cumulative snapshot after every update.
    #[serde(default)]
    pub writer: Option<MetricsWriterType>,
    #[serde(default = "default_processor_type")]
    pub processor: MetricsProcessorType,
    /// Level of the log writer's events.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory of the file writer.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

fn default_store_type() -> MetricsStoreType {
    MetricsStoreType::Memory
}

fn default_processor_type() -> MetricsProcessorType {
    MetricsProcessorType::Default
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            store: default_store_type(),
            writer: None,
            processor: default_processor_type(),
            log_level: default_log_level(),
            base_dir: None,
            extra: ExtraFields::new(),
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.writer == Some(MetricsWriterType::File) && self.base_dir.is_none() {
            return Err(invalid("metrics.base_dir", "file metrics writer requires base_dir"));
        }
        if self.log_level.parse::<tracing::Level>().is_err() {
            return Err(invalid(
                "metrics.log_level",
                format!("unknown log level '{}'", self.log_level),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

/// Everything needed to assemble an [`LlmPipeline`](crate::middleware::LlmPipeline).
///
/// A missing section disables its layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
    #[serde(default = "default_true")]
    pub log_calls: bool,
    #[serde(default = "default_true")]
    pub count_requests: bool,
    /// Per-model cost overrides registered before the pipeline is built.
    #[serde(default)]
    pub model_costs: BTreeMap<String, ModelCosts>,
}

impl PipelineConfig {
    pub fn new(model: ModelConfig) -> Self {
        Self {
            model,
            cache: None,
            rate_limit: None,
            retry: None,
            metrics: None,
            log_calls: true,
            count_requests: true,
            model_costs: BTreeMap::new(),
        }
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Err(Error::configuration_with_context(
                "unsupported config file extension",
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("pipeline_config"),
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        if let Some(c) = &self.cache {
            c.validate()?;
        }
        if let Some(r) = &self.rate_limit {
            r.validate()?;
        }
        if let Some(r) = &self.retry {
            r.validate()?;
        }
        if let Some(m) = &self.metrics {
            m.validate()?;
        }
        for (id, costs) in &self.model_costs {
            if costs.input_cost_per_token < 0.0 || costs.output_cost_per_token < 0.0 {
                return Err(invalid(
                    &format!("model_costs.{}", id),
                    "costs must not be negative",
                ));
            }
        }
        Ok(())
    }
}
