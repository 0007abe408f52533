//! Token counter implementations.

use crate::types::CallArgs;

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// Tokens a call is expected to consume: the prompt text it carries plus
    /// the completion budget it asks for.
    fn estimate_args(&self, args: &CallArgs) -> u64 {
        let prompt = args
            .prompt_text()
            .iter()
            .fold(0u64, |acc, t| acc.saturating_add(self.count(t) as u64));
        prompt.saturating_add(args.max_tokens().unwrap_or(0))
    }
}

/// Fast approximation assuming a fixed number of characters per token.
#[derive(Debug, Clone)]
pub struct CharacterEstimator {
    chars_per_token: f64,
}

impl CharacterEstimator {
    pub fn new() -> Self {
        Self {
            chars_per_token: 4.0,
        }
    }
}

impl Default for CharacterEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for CharacterEstimator {
    fn count(&self, text: &str) -> usize {
        (text.chars().count() as f64 / self.chars_per_token).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn test_character_estimate_rounds_up() {
        let c = CharacterEstimator::new();
        assert_eq!(c.count(""), 0);
        assert_eq!(c.count("abc"), 1);
        assert_eq!(c.count("abcdefgh"), 2);
        assert_eq!(c.count("abcdefghi"), 3);
    }

    #[test]
    fn test_estimate_args_includes_completion_budget() {
        let c = CharacterEstimator::new();
        let args = CallArgs::new()
            .with_model("gpt-4o")
            .with_messages(&[Message::user("abcdefgh")])
            .with("max_tokens", 100);
        // "abcdefgh" -> 2, role "user" -> 1, plus the budget
        assert_eq!(c.estimate_args(&args), 103);

        let embed = CallArgs::new().with_input(vec!["abcd".into(), "efgh".into()]);
        assert_eq!(c.estimate_args(&embed), 2);
    }

    #[test]
    fn test_estimate_saturates_on_huge_budget() {
        let c = CharacterEstimator::new();
        let args = CallArgs::new()
            .with_messages(&[Message::user("abcdefgh")])
            .with("max_tokens", i64::MAX);
        assert_eq!(c.estimate_args(&args), i64::MAX as u64 + 3);
    }
}
