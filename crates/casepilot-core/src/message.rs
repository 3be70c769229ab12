use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResult};

/// A single turn in an investigation transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<MessageContent>,
    /// Tool calls requested by the assistant in this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A single content block within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },
}

impl Message {
    /// Create a simple text message.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        let text = text.into();
        let content = if text.is_empty() {
            vec![]
        } else {
            vec![MessageContent::Text { text }]
        };
        Self {
            role,
            content,
            tool_calls: vec![],
        }
    }

    /// An assistant turn carrying free text and tool-invocation requests.
    pub fn assistant(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::text(Role::Assistant, text);
        msg.tool_calls = tool_calls;
        msg
    }

    /// A tool-results turn. Order of `results` must match the preceding calls.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::Tool,
            content: results
                .into_iter()
                .map(|r| MessageContent::ToolResult {
                    tool_call_id: r.tool_call_id,
                    content: r.content,
                    is_error: r.is_error,
                })
                .collect(),
            tool_calls: vec![],
        }
    }

    /// Extract all text content joined together.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                MessageContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Append-only, strictly ordered turn sequence for one run.
///
/// A tool-results turn may only follow the assistant turn that requested it.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Seed a transcript with the opening user turn.
    pub fn seeded(user_text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::text(Role::User, user_text)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_assistant(&mut self, message: Message) {
        debug_assert_eq!(message.role, Role::Assistant);
        self.messages.push(message);
    }

    /// Append the results turn for the most recent assistant turn.
    ///
    /// Returns `false` (and appends nothing) when the last turn is not an
    /// assistant turn or there are no results.
    pub fn push_tool_results(&mut self, results: Vec<ToolResult>) -> bool {
        let follows_assistant = self
            .messages
            .last()
            .is_some_and(|m| m.role == Role::Assistant);
        if !follows_assistant || results.is_empty() {
            return false;
        }
        self.messages.push(Message::tool_results(results));
        true
    }

    /// Number of assistant turns so far.
    pub fn assistant_turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count()
    }
}
