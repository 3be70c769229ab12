use async_trait::async_trait;
use casepilot_core::{Message, Result, Tool};
use serde::{Deserialize, Serialize};

/// A request to the reasoning backend.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// The model to use, e.g. "claude-sonnet-4-6".
    pub model: String,
    /// Conversation history.
    pub messages: Vec<Message>,
    /// Tools the model may invoke.
    pub tools: Vec<Tool>,
    /// System prompt (sent outside the message list).
    pub system: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature.
    pub temperature: f32,
}

impl LlmRequest {
    /// A single-prompt request with no tools, as used by the critic and the paraphraser.
    pub fn prompt(model: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::text(casepilot_core::Role::User, prompt)],
            tools: vec![],
            system: None,
            max_tokens,
            temperature: 0.0,
        }
    }
}

/// A complete response from the reasoning backend.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Assistant turn: free text plus any tool-invocation requests.
    pub message: Message,
    pub usage: Usage,
    /// Whether the model wants to continue (has tool calls).
    pub has_tool_calls: bool,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cache_read_tokens: u32,
    pub cache_write_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens as u64 + self.output_tokens as u64
    }

    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_write_tokens += other.cache_write_tokens;
    }
}

/// Trait implemented by each reasoning backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable name, e.g. "anthropic".
    fn name(&self) -> &str;

    /// Models this provider is known to serve.
    fn models(&self) -> Vec<String>;

    /// Send a request and wait for the full response.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Check if this provider is usable.
    async fn health_check(&self) -> Result<()>;
}
