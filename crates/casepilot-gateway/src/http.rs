//! MCP client over streamable HTTP.
//!
//! Speaks JSON-RPC 2.0 to a single endpoint: `initialize` on connect, then
//! `tools/list` and `tools/call`. Servers may answer either with a plain JSON
//! body or with a one-shot `text/event-stream`; both are accepted.

use async_trait::async_trait;
use casepilot_core::{CasepilotError, Result, Tool, ToolGateway, ToolOutput};
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Tool-invocation gateway backed by an MCP server reachable over HTTP.
///
/// Constructed explicitly and owned by whoever runs investigations; call
/// [`connect`](Self::connect) before use and [`close`](Self::close) at shutdown.
pub struct McpHttpGateway {
    client: Client,
    url: String,
    session_id: RwLock<Option<String>>,
    next_id: AtomicU64,
}

impl McpHttpGateway {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut builder = Client::builder();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CasepilotError::GatewayUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            session_id: RwLock::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Perform the `initialize` handshake and remember the server's session id.
    pub async fn connect(&self) -> Result<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "casepilot",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let result = self
            .request("initialize", params)
            .await
            .map_err(|e| CasepilotError::GatewayUnavailable(e.to_string()))?;

        self.notify("notifications/initialized").await?;

        info!(
            url = %self.url,
            server = result["serverInfo"]["name"].as_str().unwrap_or("unknown"),
            session = self.session_id().as_deref().unwrap_or("-"),
            "tool gateway connected"
        );
        Ok(())
    }

    /// End the server-side session, if one was opened.
    pub async fn close(&self) -> Result<()> {
        let Some(session) = self.session_id.write().take() else {
            return Ok(());
        };
        let resp = self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, &session)
            .send()
            .await;
        match resp {
            Ok(r) if r.status().is_success() || r.status().as_u16() == 405 => {
                debug!(session = %session, "tool gateway session closed");
            }
            Ok(r) => warn!(status = %r.status(), "tool gateway refused session close"),
            Err(e) => warn!(error = %e, "tool gateway session close failed"),
        }
        Ok(())
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: None,
            method,
            params: json!({}),
        };
        let resp = self
            .post(&body)
            .send()
            .await
            .map_err(|e| CasepilotError::GatewayUnavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(CasepilotError::GatewayUnavailable(format!(
                "{method}: HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }

    fn post<T: Serialize>(&self, body: &T) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(&self.url)
            .header("accept", "application/json, text/event-stream")
            .json(body);
        if let Some(ref session) = *self.session_id.read() {
            req = req.header(SESSION_HEADER, session);
        }
        req
    }

    /// Send one JSON-RPC request and return its `result`.
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        };
        let resp = self
            .post(&body)
            .send()
            .await
            .map_err(|e| rpc_failure(method, e.to_string()))?;

        if let Some(session) = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.write() = Some(session.to_string());
        }

        let status = resp.status();
        let is_event_stream = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let text = resp
            .text()
            .await
            .map_err(|e| rpc_failure(method, e.to_string()))?;

        if !status.is_success() {
            return Err(rpc_failure(method, format!("HTTP {status}: {text}")));
        }

        let response = if is_event_stream {
            parse_event_stream(&text, id)
        } else {
            serde_json::from_str::<RpcResponse>(&text).ok()
        }
        .ok_or_else(|| rpc_failure(method, "unparseable JSON-RPC response".into()))?;

        if let Some(err) = response.error {
            return Err(rpc_failure(
                method,
                format!("JSON-RPC error {}: {}", err.code, err.message),
            ));
        }
        response
            .result
            .ok_or_else(|| rpc_failure(method, "response has no result".into()))
    }
}

fn rpc_failure(method: &str, reason: String) -> CasepilotError {
    CasepilotError::ToolInvocation {
        tool: method.to_string(),
        reason,
    }
}

/// Pick the response to request `id` out of an SSE body.
fn parse_event_stream(body: &str, id: u64) -> Option<RpcResponse> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<RpcResponse>(data.trim()).ok())
        .find(|r| r.id.as_ref().and_then(Value::as_u64) == Some(id))
}

/// Text of the first text content block of a `tools/call` result.
fn first_text(result: &Value) -> String {
    result["content"]
        .as_array()
        .and_then(|blocks| blocks.iter().find(|b| b["type"] == "text"))
        .and_then(|b| b["text"].as_str())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl ToolGateway for McpHttpGateway {
    async fn list_tools(&self) -> Result<Vec<Tool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match cursor.take() {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let result = self.request("tools/list", params).await?;
            let page = result["tools"].as_array().cloned().unwrap_or_default();
            for t in page {
                let Some(name) = t["name"].as_str() else {
                    warn!("skipping gateway tool without a name");
                    continue;
                };
                tools.push(Tool {
                    name: name.to_string(),
                    description: t["description"].as_str().unwrap_or_default().to_string(),
                    parameters: t
                        .get("inputSchema")
                        .cloned()
                        .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
                });
            }
            match result["nextCursor"].as_str() {
                Some(next) if !next.is_empty() => cursor = Some(next.to_string()),
                _ => break,
            }
        }
        debug!(count = tools.len(), "gateway tools listed");
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<ToolOutput> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self
            .request("tools/call", params)
            .await
            .map_err(|e| match e {
                CasepilotError::ToolInvocation { reason, .. } => CasepilotError::ToolInvocation {
                    tool: name.to_string(),
                    reason,
                },
                other => other,
            })?;

        let text = first_text(&result);
        if result["isError"].as_bool().unwrap_or(false) {
            Ok(ToolOutput::error(text))
        } else {
            Ok(ToolOutput::text(text))
        }
    }
}
