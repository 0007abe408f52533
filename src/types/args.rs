//! Keyword arguments of a provider call.

use super::message::Message;
use super::value::HashableValue;
use crate::{Error, ErrorContext, Result};
use std::collections::BTreeMap;

/// Arguments forwarded to the provider, keyed by argument name.
///
/// The well-known keys are `model`, `messages` (completions), `input`
/// (embeddings), `stream` and the sampling parameters; anything else is passed
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    values: BTreeMap<String, HashableValue>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<HashableValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_model(self, model: impl Into<String>) -> Self {
        self.with("model", model.into())
    }

    pub fn with_messages(self, messages: &[Message]) -> Self {
        let seq: Vec<HashableValue> = messages.iter().map(Message::to_hashable).collect();
        self.with("messages", seq)
    }

    pub fn with_input(self, input: Vec<String>) -> Self {
        self.with("input", input)
    }

    pub fn with_stream(self, stream: bool) -> Self {
        self.with("stream", stream)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<HashableValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&HashableValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<HashableValue> {
        self.values.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HashableValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn model(&self) -> Option<&str> {
        self.get("model").and_then(HashableValue::as_str)
    }

    pub fn is_streaming(&self) -> bool {
        self.get("stream")
            .and_then(HashableValue::as_bool)
            .unwrap_or(false)
    }

    /// Requested completion budget, if any.
    pub fn max_tokens(&self) -> Option<u64> {
        self.get("max_tokens")
            .or_else(|| self.get("max_completion_tokens"))
            .and_then(HashableValue::as_u64)
    }

    /// Text the provider will read: message contents, embedding inputs and prompts.
    pub fn prompt_text(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for key in ["messages", "input", "prompt"] {
            if let Some(v) = self.get(key) {
                v.collect_text(&mut out);
            }
        }
        out
    }

    /// Build arguments from a JSON object.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(Self {
                values: map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            }),
            other => Err(Error::configuration_with_context(
                "call arguments must be a JSON object",
                ErrorContext::new()
                    .with_details(format!("got {}", other))
                    .with_source("call_args"),
            )),
        }
    }

    /// Canonical JSON of the whole argument map.
    pub fn to_canonical_json(&self) -> serde_json::Value {
        HashableValue::Map(self.values.clone()).to_canonical_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builders_and_accessors() {
        let args = CallArgs::new()
            .with_model("gpt-4o")
            .with_messages(&[Message::system("be brief"), Message::user("hello")])
            .with("max_tokens", 64)
            .with_stream(true);
        assert_eq!(args.model(), Some("gpt-4o"));
        assert!(args.is_streaming());
        assert_eq!(args.max_tokens(), Some(64));
        let text = args.prompt_text();
        assert!(text.contains(&"be brief"));
        assert!(text.contains(&"hello"));
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(CallArgs::from_json(json!([1, 2])).is_err());
        let args = CallArgs::from_json(json!({"model": "m", "temperature": 0.2})).unwrap();
        assert_eq!(args.model(), Some("m"));
        assert_eq!(args.len(), 2);
    }
}
