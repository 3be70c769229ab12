use async_trait::async_trait;
use casepilot_core::{CasepilotError, Message, MessageContent, Result, Role, ToolCall};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

use crate::provider::*;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Convert a request into the Messages API body.
    pub fn build_request_body(&self, request: &LlmRequest) -> Value {
        let mut messages = Vec::new();
        for msg in &request.messages {
            match msg.role {
                Role::User => {
                    messages.push(json!({
                        "role": "user",
                        "content": msg.text_content(),
                    }));
                }
                Role::Assistant => {
                    if msg.tool_calls.is_empty() {
                        messages.push(json!({
                            "role": "assistant",
                            "content": msg.text_content(),
                        }));
                    } else {
                        let mut content_blocks: Vec<Value> = Vec::new();
                        let text = msg.text_content();
                        if !text.is_empty() {
                            content_blocks.push(json!({
                                "type": "text",
                                "text": text,
                            }));
                        }
                        for tc in &msg.tool_calls {
                            content_blocks.push(json!({
                                "type": "tool_use",
                                "id": tc.id,
                                "name": tc.tool_name,
                                "input": tc.arguments,
                            }));
                        }
                        messages.push(json!({
                            "role": "assistant",
                            "content": content_blocks,
                        }));
                    }
                }
                Role::Tool => {
                    // Tool results go back as one user turn of tool_result blocks
                    let content_blocks: Vec<Value> = msg
                        .content
                        .iter()
                        .filter_map(|block| match block {
                            MessageContent::ToolResult {
                                tool_call_id,
                                content,
                                is_error,
                            } => Some(json!({
                                "type": "tool_result",
                                "tool_use_id": tool_call_id,
                                "content": content,
                                "is_error": is_error,
                            })),
                            _ => None,
                        })
                        .collect();
                    messages.push(json!({
                        "role": "user",
                        "content": content_blocks,
                    }));
                }
            }
        }

        let mut body = json!({
            "model": &request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });

        if let Some(ref system) = request.system {
            body["system"] = json!(system);
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        body
    }

    /// Parse a Messages API response body.
    pub fn parse_response_body(data: &Value) -> Result<LlmResponse> {
        let blocks = data["content"].as_array().ok_or_else(|| {
            CasepilotError::MalformedResponse("response has no content array".into())
        })?;

        let content_text = blocks
            .iter()
            .filter(|b| b["type"] == "text")
            .filter_map(|b| b["text"].as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut tool_calls = Vec::new();
        for b in blocks.iter().filter(|b| b["type"] == "tool_use") {
            let (Some(id), Some(name)) = (b["id"].as_str(), b["name"].as_str()) else {
                return Err(CasepilotError::MalformedResponse(
                    "tool_use block without id or name".into(),
                ));
            };
            tool_calls.push(ToolCall {
                id: id.to_string(),
                tool_name: name.to_string(),
                arguments: b["input"].clone(),
            });
        }

        let has_tool_calls = !tool_calls.is_empty();
        let stop_reason = match data["stop_reason"].as_str() {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        };

        let usage_data = &data["usage"];
        let token = |key: &str| usage_data[key].as_u64().unwrap_or(0) as u32;

        Ok(LlmResponse {
            message: Message::assistant(content_text, tool_calls),
            usage: Usage {
                input_tokens: token("input_tokens"),
                output_tokens: token("output_tokens"),
                cache_read_tokens: token("cache_read_input_tokens"),
                cache_write_tokens: token("cache_creation_input_tokens"),
            },
            has_tool_calls,
            stop_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn models(&self) -> Vec<String> {
        vec![
            "claude-sonnet-4-6".into(),
            "claude-opus-4-6".into(),
            "claude-haiku-4-5-20251001".into(),
        ]
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = self.build_request_body(request);
        debug!(model = %request.model, messages = request.messages.len(), "sending Anthropic API request");

        let resp = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CasepilotError::BackendUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            if status.as_u16() == 429 {
                let retry_after_secs = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30);
                return Err(CasepilotError::RateLimited { retry_after_secs });
            }
            let text = resp.text().await.unwrap_or_default();
            return Err(CasepilotError::BackendUnavailable(format!(
                "HTTP {status}: {text}"
            )));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| CasepilotError::MalformedResponse(e.to_string()))?;

        Self::parse_response_body(&data)
    }

    async fn health_check(&self) -> Result<()> {
        info!("checking Anthropic API configuration");
        if self.api_key.is_empty() {
            return Err(CasepilotError::BackendUnavailable(
                "ANTHROPIC_API_KEY not set".into(),
            ));
        }
        Ok(())
    }
}
