//! Adapter from provider objects to the call function pair.

use crate::middleware::CallFns;
use crate::types::{AsyncOutput, LlmRequest, SyncOutput};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A model provider with blocking and suspending entry points.
///
/// Implementations map transport failures to
/// [`Error::Provider`](crate::Error::Provider) with the matching
/// [`ProviderErrorKind`](crate::ProviderErrorKind) so the retry layer can
/// classify them.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn call(&self, request: LlmRequest) -> Result<SyncOutput>;

    async fn call_async(&self, request: LlmRequest) -> Result<AsyncOutput>;

    fn name(&self) -> &str;
}

impl CallFns {
    /// Base pair that forwards to `provider`.
    pub fn from_provider(provider: Arc<dyn LlmProvider>) -> Self {
        let sync_provider = provider.clone();
        CallFns::new(
            move |req: LlmRequest| sync_provider.call(req),
            move |req: LlmRequest| {
                let provider = provider.clone();
                async move { provider.call_async(req).await }
            },
        )
    }
}
