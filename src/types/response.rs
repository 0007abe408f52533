//! Provider responses: buffered completions, embeddings and streamed chunks.

use serde::{Deserialize, Serialize};

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    pub fn accumulate(&mut self, other: &Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub model: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    pub fn new(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            model: model.into(),
            content: content.into(),
            finish_reason: None,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Reduce a streamed chunk sequence to the equivalent buffered response.
    ///
    /// Usage is summed across chunks; chunks without usage contribute nothing.
    pub fn from_chunks(chunks: &[CompletionChunk]) -> Self {
        let mut response = CompletionResponse::default();
        let mut usage: Option<Usage> = None;
        for chunk in chunks {
            if response.id.is_empty() {
                response.id = chunk.id.clone();
            }
            if response.model.is_empty() {
                response.model = chunk.model.clone();
            }
            response.content.push_str(&chunk.delta);
            if chunk.finish_reason.is_some() {
                response.finish_reason = chunk.finish_reason.clone();
            }
            if let Some(u) = &chunk.usage {
                usage.get_or_insert_with(Usage::default).accumulate(u);
            }
        }
        response.usage = usage;
        response
    }

    /// Replay this response as a single chunk.
    pub fn to_chunk(&self) -> CompletionChunk {
        CompletionChunk {
            id: self.id.clone(),
            model: self.model.clone(),
            delta: self.content.clone(),
            finish_reason: self.finish_reason.clone(),
            usage: self.usage,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub model: String,
    pub data: Vec<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// One element of a streamed completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionChunk {
    pub id: String,
    pub model: String,
    pub delta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl CompletionChunk {
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// A buffered provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "object", rename_all = "snake_case")]
pub enum ModelResponse {
    Completion(CompletionResponse),
    Embedding(EmbeddingResponse),
}

impl ModelResponse {
    pub fn usage(&self) -> Option<&Usage> {
        match self {
            ModelResponse::Completion(c) => c.usage.as_ref(),
            ModelResponse::Embedding(e) => e.usage.as_ref(),
        }
    }

    pub fn as_completion(&self) -> Option<&CompletionResponse> {
        match self {
            ModelResponse::Completion(c) => Some(c),
            ModelResponse::Embedding(_) => None,
        }
    }

    pub fn as_embedding(&self) -> Option<&EmbeddingResponse> {
        match self {
            ModelResponse::Embedding(e) => Some(e),
            ModelResponse::Completion(_) => None,
        }
    }

    /// Completion text, if this is a completion.
    pub fn content(&self) -> Option<&str> {
        self.as_completion().map(|c| c.content.as_str())
    }
}

impl From<CompletionResponse> for ModelResponse {
    fn from(c: CompletionResponse) -> Self {
        ModelResponse::Completion(c)
    }
}

impl From<EmbeddingResponse> for ModelResponse {
    fn from(e: EmbeddingResponse) -> Self {
        ModelResponse::Embedding(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_chunks_concatenates_and_sums_usage() {
        let chunks = vec![
            CompletionChunk {
                id: "c1".into(),
                model: "gpt-4o".into(),
                delta: "Hel".into(),
                ..Default::default()
            },
            CompletionChunk::text("lo").with_usage(Usage::new(3, 1)),
            CompletionChunk {
                delta: "!".into(),
                finish_reason: Some("stop".into()),
                usage: Some(Usage::new(0, 1)),
                ..Default::default()
            },
        ];
        let resp = CompletionResponse::from_chunks(&chunks);
        assert_eq!(resp.id, "c1");
        assert_eq!(resp.model, "gpt-4o");
        assert_eq!(resp.content, "Hello!");
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage, Some(Usage::new(3, 2)));
    }

    #[test]
    fn test_model_response_tagged_serialization() {
        let resp = ModelResponse::from(CompletionResponse::new("m", "ok"));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["object"], "completion");
        let back: ModelResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, resp);
    }
}
