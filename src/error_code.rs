//! Provider error taxonomy.
//!
//! Every error raised by a model provider is mapped onto a [`ProviderErrorKind`].
//! The kind decides how the retry layer treats the failure:
//!
//! | Kind                      | Retried | Typical source                     |
//! |---------------------------|---------|------------------------------------|
//! | `InvalidRequest`          | no      | HTTP 400, malformed parameters     |
//! | `Authentication`          | no      | HTTP 401, invalid API key          |
//! | `PermissionDenied`        | no      | HTTP 403                           |
//! | `NotFound`                | no      | HTTP 404, unknown model            |
//! | `ContentPolicyViolation`  | no      | provider content filter            |
//! | `BudgetExceeded`          | no      | account spend limit                |
//! | `ContextWindowExceeded`   | no      | input larger than the context      |
//! | `UnsupportedParams`       | no      | parameter not supported by model   |
//! | `RateLimited`             | yes     | HTTP 429                           |
//! | `Timeout`                 | yes     | HTTP 408/504                       |
//! | `ServerError`             | yes     | HTTP 500                           |
//! | `ServiceUnavailable`      | yes     | HTTP 503/529                       |
//! | `Connection`              | yes     | transport failure                  |
//! | `Unknown`                 | yes     | anything unclassified              |

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    InvalidRequest,
    Authentication,
    PermissionDenied,
    NotFound,
    ContentPolicyViolation,
    BudgetExceeded,
    ContextWindowExceeded,
    UnsupportedParams,
    RateLimited,
    Timeout,
    ServerError,
    ServiceUnavailable,
    Connection,
    Unknown,
}

/// Error kinds for which retrying cannot help.
pub const SKIP_LIST: &[ProviderErrorKind] = &[
    ProviderErrorKind::InvalidRequest,
    ProviderErrorKind::Authentication,
    ProviderErrorKind::PermissionDenied,
    ProviderErrorKind::NotFound,
    ProviderErrorKind::ContentPolicyViolation,
    ProviderErrorKind::BudgetExceeded,
    ProviderErrorKind::ContextWindowExceeded,
    ProviderErrorKind::UnsupportedParams,
];

impl ProviderErrorKind {
    /// Returns the standard name (e.g., `"invalid_request"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::ContentPolicyViolation => "content_policy_violation",
            Self::BudgetExceeded => "budget_exceeded",
            Self::ContextWindowExceeded => "context_window_exceeded",
            Self::UnsupportedParams => "unsupported_params",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::ServerError => "server_error",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Connection => "connection",
            Self::Unknown => "unknown",
        }
    }

    /// Whether this kind is on the non-retryable skip-list.
    #[inline]
    pub fn is_skipped(&self) -> bool {
        SKIP_LIST.contains(self)
    }

    /// Maps a provider error code/type string to the corresponding kind.
    ///
    /// Supports both the standard names and common provider aliases such as
    /// `"invalid_api_key"` or `"context_length_exceeded"`.
    pub fn from_provider_code(provider_code: &str) -> Option<Self> {
        let kind = match provider_code {
            "invalid_request" | "invalid_request_error" | "bad_request" => Self::InvalidRequest,
            "authentication" | "authentication_error" | "invalid_api_key" => Self::Authentication,
            "permission_denied" | "permission_error" => Self::PermissionDenied,
            "not_found" | "model_not_found" => Self::NotFound,
            "content_policy_violation" | "content_filter" => Self::ContentPolicyViolation,
            "budget_exceeded" | "insufficient_quota" => Self::BudgetExceeded,
            "context_window_exceeded" | "context_length_exceeded" => Self::ContextWindowExceeded,
            "unsupported_params" | "unsupported_parameter" => Self::UnsupportedParams,
            "rate_limited" | "rate_limit_exceeded" => Self::RateLimited,
            "timeout" => Self::Timeout,
            "server_error" => Self::ServerError,
            "service_unavailable" | "overloaded" | "overloaded_error" => Self::ServiceUnavailable,
            "connection" | "connection_error" => Self::Connection,
            _ => return None,
        };
        Some(kind)
    }

    /// Maps an HTTP status code to the most likely kind.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 | 504 => Self::Timeout,
            429 => Self::RateLimited,
            500 => Self::ServerError,
            502 | 503 | 529 => Self::ServiceUnavailable,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_list_membership() {
        for kind in SKIP_LIST {
            assert!(kind.is_skipped(), "{} should be skipped", kind);
        }
        for kind in [
            ProviderErrorKind::RateLimited,
            ProviderErrorKind::Timeout,
            ProviderErrorKind::ServerError,
            ProviderErrorKind::ServiceUnavailable,
            ProviderErrorKind::Connection,
            ProviderErrorKind::Unknown,
        ] {
            assert!(!kind.is_skipped(), "{} should be retried", kind);
        }
    }

    #[test]
    fn test_provider_code_aliases() {
        assert_eq!(
            ProviderErrorKind::from_provider_code("context_length_exceeded"),
            Some(ProviderErrorKind::ContextWindowExceeded)
        );
        assert_eq!(
            ProviderErrorKind::from_provider_code("overloaded_error"),
            Some(ProviderErrorKind::ServiceUnavailable)
        );
        assert_eq!(ProviderErrorKind::from_provider_code("weird"), None);
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ProviderErrorKind::from_http_status(401), ProviderErrorKind::Authentication);
        assert_eq!(ProviderErrorKind::from_http_status(429), ProviderErrorKind::RateLimited);
        assert_eq!(ProviderErrorKind::from_http_status(529), ProviderErrorKind::ServiceUnavailable);
        assert_eq!(ProviderErrorKind::from_http_status(418), ProviderErrorKind::Unknown);
    }
}
