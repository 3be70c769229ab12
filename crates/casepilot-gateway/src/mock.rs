//! Scriptable tool gateway for deterministic tests.

use async_trait::async_trait;
use casepilot_core::{CasepilotError, Result, Tool, ToolGateway, ToolOutput};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// One scripted reply for a tool invocation.
#[derive(Debug, Clone)]
pub enum MockToolReply {
    /// Successful payload (usually JSON text).
    Output(String),
    /// The tool ran but reported an error.
    ToolError(String),
    /// The invocation itself failed.
    Fail(String),
}

/// A recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub tool_name: String,
    pub arguments: Value,
}

/// A gateway that serves scripted replies per tool name.
///
/// Replies queued for a tool are consumed in order; once exhausted the
/// tool falls back to the default reply (`{}` unless overridden).
pub struct MockGateway {
    tools: Vec<Tool>,
    replies: Mutex<HashMap<String, VecDeque<MockToolReply>>>,
    default_reply: MockToolReply,
    fail_list: Option<String>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            tools: vec![],
            replies: Mutex::new(HashMap::new()),
            default_reply: MockToolReply::Output("{}".into()),
            fail_list: None,
            delay: None,
            calls: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Advertise a tool with an open object schema.
    pub fn with_tool(mut self, name: &str) -> Self {
        self.tools.push(Tool {
            name: name.to_string(),
            description: format!("Mock {name}"),
            parameters: json!({"type": "object", "properties": {}}),
        });
        self
    }

    /// Queue a JSON payload for the next call to `name`.
    pub fn with_output(self, name: &str, payload: Value) -> Self {
        self.push(name, MockToolReply::Output(payload.to_string()))
    }

    /// Queue a raw text payload for the next call to `name`.
    pub fn with_text(self, name: &str, text: &str) -> Self {
        self.push(name, MockToolReply::Output(text.to_string()))
    }

    /// Queue a tool-reported error for the next call to `name`.
    pub fn with_tool_error(self, name: &str, message: &str) -> Self {
        self.push(name, MockToolReply::ToolError(message.to_string()))
    }

    /// Queue an invocation failure for the next call to `name`.
    pub fn with_failure(self, name: &str, reason: &str) -> Self {
        self.push(name, MockToolReply::Fail(reason.to_string()))
    }

    /// Reply used when nothing is queued for a tool.
    pub fn with_default_reply(mut self, reply: MockToolReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Make every call fail, as if the gateway were down.
    pub fn failing(self, reason: &str) -> Self {
        self.with_default_reply(MockToolReply::Fail(reason.to_string()))
    }

    /// Make `list_tools` fail.
    pub fn with_list_failure(mut self, reason: &str) -> Self {
        self.fail_list = Some(reason.to_string());
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn recorded_calls(&self) -> Arc<Mutex<Vec<RecordedCall>>> {
        Arc::clone(&self.calls)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn push(self, name: &str, reply: MockToolReply) -> Self {
        self.replies
            .lock()
            .entry(name.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    fn next_reply(&self, name: &str) -> MockToolReply {
        self.replies
            .lock()
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

#[async_trait]
impl ToolGateway for MockGateway {
    async fn list_tools(&self) -> Result<Vec<Tool>> {
        if let Some(ref reason) = self.fail_list {
            return Err(CasepilotError::GatewayUnavailable(reason.clone()));
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<ToolOutput> {
        self.calls.lock().push(RecordedCall {
            tool_name: name.to_string(),
            arguments: arguments.clone(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_reply(name) {
            MockToolReply::Output(text) => Ok(ToolOutput::text(text)),
            MockToolReply::ToolError(text) => Ok(ToolOutput::error(text)),
            MockToolReply::Fail(reason) => Err(CasepilotError::ToolInvocation {
                tool: name.to_string(),
                reason,
            }),
        }
    }
}
