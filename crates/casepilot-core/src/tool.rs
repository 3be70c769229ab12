use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description of a tool the reasoning backend may invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    /// Human-readable description for the model.
    pub description: String,
    /// JSON Schema of the input object.
    pub parameters: Value,
}

/// A request from the model to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// A tool result fed back into the transcript, positionally matched to its call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

/// Raw payload returned by the gateway for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text of the first content block (expected to be JSON).
    pub text: String,
    /// The gateway served the call but the tool itself reported an error.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// Parse the payload as JSON. Empty text is `{}`; non-JSON text is wrapped as `{"raw": text}`.
    pub fn parsed(&self) -> Value {
        if self.text.trim().is_empty() {
            return Value::Object(Default::default());
        }
        serde_json::from_str(&self.text)
            .unwrap_or_else(|_| serde_json::json!({ "raw": self.text }))
    }
}

/// The external tool-invocation gateway. Only its call/response contract is modelled here.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// List the tool schemas the gateway exposes.
    async fn list_tools(&self) -> crate::Result<Vec<Tool>>;

    /// Invoke a named tool. `Err` means the invocation itself failed
    /// (transport, protocol); a tool-level failure comes back as `ToolOutput::is_error`.
    async fn call_tool(&self, name: &str, arguments: &Value) -> crate::Result<ToolOutput>;
}
