use crate::error_code::ProviderErrorKind;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "retry.max_retries")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "retry_config", "file_cache")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// An error raised by the model provider transport.
///
/// The `kind` decides whether the retry layer may try again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (HTTP {}): {message}", format_status(.status))]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Classify a failed HTTP exchange by its status code.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::from_http_status(status),
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_retryable(&self) -> bool {
        !self.kind.is_skipped()
    }
}

/// Unified error type for the resilience layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Cache error: {message}{}", format_context(.context))]
    Cache {
        message: String,
        context: ErrorContext,
    },

    #[error("Metrics error: {message}{}", format_context(.context))]
    Metrics {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn cache_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Cache {
            message: msg.into(),
            context,
        }
    }

    pub fn metrics_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Metrics {
            message: msg.into(),
            context,
        }
    }

    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Shorthand for a provider error of the given kind.
    pub fn provider(kind: ProviderErrorKind, msg: impl Into<String>) -> Self {
        Error::Provider(ProviderError::new(kind, msg))
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Cache { context, .. }
            | Error::Metrics { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The provider error classification, if this error came from the provider.
    pub fn provider_kind(&self) -> Option<ProviderErrorKind> {
        match self {
            Error::Provider(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Whether a retry policy may attempt the call again after this error.
    ///
    /// Skip-listed provider errors, configuration errors and cancellation are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Provider(e) => e.is_retryable(),
            Error::Configuration { .. } | Error::Cancelled => false,
            _ => true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display_includes_context() {
        let err = Error::configuration_with_context(
            "max_retries must be greater than 1",
            ErrorContext::new()
                .with_field_path("retry.max_retries")
                .with_source("retry_config"),
        );
        let msg = err.to_string();
        assert!(msg.contains("max_retries must be greater than 1"));
        assert!(msg.contains("field: retry.max_retries"));
        assert!(msg.contains("source: retry_config"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::provider(ProviderErrorKind::RateLimited, "slow down").is_retryable());
        assert!(Error::provider(ProviderErrorKind::ServerError, "boom").is_retryable());
        assert!(!Error::provider(ProviderErrorKind::Authentication, "bad key").is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::configuration_with_context("x", ErrorContext::new()).is_retryable());
        assert!(Error::Io(std::io::Error::other("reset")).is_retryable());
    }

    #[test]
    fn test_provider_error_from_status() {
        let err = ProviderError::from_http_status(429, "too many requests");
        assert_eq!(err.kind, ProviderErrorKind::RateLimited);
        assert_eq!(err.status, Some(429));
        assert!(err.to_string().contains("HTTP 429"));
    }
}
