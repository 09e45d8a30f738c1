//! Inference types for requests, responses, and usage accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inference backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// OpenAI-compatible hosted proxy
    Proxy,
    /// Local llamafile completion server
    Llamafile,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proxy => write!(f, "proxy"),
            Self::Llamafile => write!(f, "llamafile"),
        }
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model to use (overrides the client default if set)
    pub model: Option<String>,
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 1.0)
    pub temperature: Option<f64>,
    /// Nucleus sampling cutoff
    pub top_p: Option<f64>,
    /// Repetition penalty (llamafile backends)
    pub repeat_penalty: Option<f64>,
    /// Stop sequences
    pub stop: Option<Vec<String>>,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            model: None,
            messages: Vec::new(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            repeat_penalty: None,
            stop: None,
        }
    }
}

impl CompletionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p.clamp(0.0, 1.0));
        self
    }

    pub fn with_repeat_penalty(mut self, penalty: f64) -> Self {
        self.repeat_penalty = Some(penalty);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Model that produced the content
    pub model: String,
    /// Generated content
    pub content: String,
    /// Token usage (zeroed when the backend reports none)
    pub usage: TokenUsage,
    /// Response timestamp
    pub timestamp: DateTime<Utc>,
}

/// Embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Model to use
    pub model: Option<String>,
    /// Texts to embed
    pub texts: Vec<String>,
}

/// Embedding response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// Model used
    pub model: String,
    /// Embedding vectors
    pub embeddings: Vec<Vec<f32>>,
    /// Token usage
    pub usage: TokenUsage,
}

/// Cumulative token accounting against an optional budget.
///
/// Counters only go up; remaining budget is derived, never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageTracker {
    /// Total input tokens consumed
    pub total_input_tokens: u64,
    /// Total output tokens consumed
    pub total_output_tokens: u64,
    /// Number of completed requests
    pub request_count: u64,
    /// Optional total-token budget
    pub token_budget: Option<u64>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker with a total-token budget.
    pub fn with_budget(budget: u64) -> Self {
        Self {
            token_budget: Some(budget),
            ..Self::default()
        }
    }

    /// Record usage from a completion response.
    pub fn record(&mut self, usage: &TokenUsage) {
        self.total_input_tokens += usage.input_tokens;
        self.total_output_tokens += usage.output_tokens;
        self.request_count += 1;
    }

    /// Total tokens consumed so far.
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }

    /// Tokens remaining under the budget, if one is set.
    pub fn remaining(&self) -> Option<u64> {
        self.token_budget
            .map(|b| b.saturating_sub(self.total_tokens()))
    }

    /// Whether the budget (if any) has been consumed.
    pub fn exhausted(&self) -> bool {
        matches!(self.remaining(), Some(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_completion_request_builder() {
        let req = CompletionRequest::new()
            .with_model("gpt-4o-mini")
            .with_message(ChatMessage::system("You are helpful"))
            .with_message(ChatMessage::user("Hi"))
            .with_max_tokens(800)
            .with_temperature(0.3)
            .with_top_p(0.9)
            .with_stop(vec!["```".to_string()]);

        assert_eq!(req.model, Some("gpt-4o-mini".to_string()));
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, ChatRole::System);
        assert_eq!(req.max_tokens, Some(800));
        assert_eq!(req.temperature, Some(0.3));
        assert_eq!(req.top_p, Some(0.9));
        assert_eq!(req.stop, Some(vec!["```".to_string()]));
    }

    #[test]
    fn test_temperature_is_clamped() {
        let req = CompletionRequest::new().with_temperature(3.5);
        assert_eq!(req.temperature, Some(1.0));
    }

    #[test]
    fn test_usage_tracker_budget() {
        let mut tracker = UsageTracker::with_budget(1_000);

        tracker.record(&TokenUsage {
            input_tokens: 300,
            output_tokens: 200,
        });
        assert_eq!(tracker.total_tokens(), 500);
        assert_eq!(tracker.remaining(), Some(500));
        assert!(!tracker.exhausted());

        tracker.record(&TokenUsage {
            input_tokens: 600,
            output_tokens: 100,
        });
        // Saturates at zero rather than underflowing.
        assert_eq!(tracker.remaining(), Some(0));
        assert!(tracker.exhausted());
        assert_eq!(tracker.request_count, 2);
    }

    #[test]
    fn test_usage_tracker_without_budget() {
        let mut tracker = UsageTracker::new();
        tracker.record(&TokenUsage {
            input_tokens: 10,
            output_tokens: 10,
        });
        assert_eq!(tracker.remaining(), None);
        assert!(!tracker.exhausted());
    }
}
