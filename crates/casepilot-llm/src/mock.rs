//! Scripted reasoning backend for tests.
//!
//! Replays a queue of canned turns and records every request it receives.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::provider::*;
use casepilot_core::{CasepilotError, Message, Result, ToolCall};

/// Answers `complete` calls from a FIFO of [`MockResponse`]s.
///
/// # Example
/// ```
/// use casepilot_llm::mock::MockProvider;
/// let provider = MockProvider::new("test")
///     .with_response("Hello, world!");
/// ```
pub struct MockProvider {
    queue: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
    name: String,
}

/// A pre-configured response from the mock provider.
#[derive(Clone)]
pub struct MockResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: Usage,
    /// If set, the provider will return this error instead.
    pub error: Option<String>,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            text: String::new(),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: Usage {
                input_tokens: 100,
                output_tokens: 50,
                cache_read_tokens: 0,
                cache_write_tokens: 0,
            },
            error: None,
        }
    }
}

impl MockResponse {
    /// Create a text response.
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    /// Create an error response.
    pub fn error(msg: &str) -> Self {
        Self {
            error: Some(msg.to_string()),
            ..Default::default()
        }
    }

    /// A tool-use turn requesting several tools at once, with optional free text.
    pub fn tool_calls(text: &str, calls: Vec<(&str, serde_json::Value)>) -> Self {
        Self {
            text: text.to_string(),
            tool_calls: calls
                .into_iter()
                .map(|(name, args)| ToolCall {
                    id: format!("toolu_{}", uuid::Uuid::new_v4().simple()),
                    tool_name: name.to_string(),
                    arguments: args,
                })
                .collect(),
            stop_reason: StopReason::ToolUse,
            ..Default::default()
        }
    }
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(vec![])),
            name: name.into(),
        }
    }

    /// Queue a simple text response.
    pub fn with_response(self, text: &str) -> Self {
        self.queue.lock().push_back(MockResponse::text(text));
        self
    }

    /// Queue a single tool call response.
    pub fn with_tool_call(self, name: &str, args: serde_json::Value) -> Self {
        self.queue
            .lock()
            .push_back(MockResponse::tool_calls("", vec![(name, args)]));
        self
    }

    /// Queue an error response.
    pub fn with_error(self, error: &str) -> Self {
        self.queue.lock().push_back(MockResponse::error(error));
        self
    }

    /// Queue a fully custom response.
    pub fn with_mock_response(self, resp: MockResponse) -> Self {
        self.queue.lock().push_back(resp);
        self
    }

    /// Get all requests that were made to this provider.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<LlmRequest>>> {
        Arc::clone(&self.requests)
    }

    /// Number of `complete` calls so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Queue a response on a provider that is already shared.
    pub fn queue_response(&self, resp: MockResponse) {
        self.queue.lock().push_back(resp);
    }

    /// Next scripted turn; an exhausted queue answers with plain text and `end_turn`.
    fn next_response(&self) -> MockResponse {
        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| MockResponse::text("(mock: queue exhausted)"))
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn models(&self) -> Vec<String> {
        vec!["mock/test-model".to_string()]
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request.clone());
        let mock = self.next_response();

        if let Some(error) = mock.error {
            return Err(CasepilotError::BackendUnavailable(error));
        }

        let has_tool_calls = !mock.tool_calls.is_empty();
        Ok(LlmResponse {
            message: Message::assistant(mock.text, mock.tool_calls),
            usage: mock.usage,
            has_tool_calls,
            stop_reason: mock.stop_reason,
        })
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
