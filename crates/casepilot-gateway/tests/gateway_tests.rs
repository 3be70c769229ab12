#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use casepilot_core::{CasepilotError, ToolGateway};
    use casepilot_gateway::{McpHttpGateway, MockGateway, MockToolReply};
    use serde_json::{Value, json};
    use std::time::Duration;

    async fn mcp_handler(headers: HeaderMap, Json(req): Json<Value>) -> Response {
        let id = req["id"].clone();
        let method = req["method"].as_str().unwrap_or_default().to_string();

        if id.is_null() {
            return StatusCode::ACCEPTED.into_response();
        }
        let has_session = headers.get("mcp-session-id").is_some();

        let body = match method.as_str() {
            "initialize" => {
                let body = json!({"jsonrpc": "2.0", "id": id, "result": {
                    "protocolVersion": "2025-03-26",
                    "serverInfo": {"name": "test-tools"}
                }});
                return ([("mcp-session-id", "sess-42")], Json(body)).into_response();
            }
            "tools/list" if req["params"]["cursor"].is_null() => json!({"jsonrpc": "2.0", "id": id, "result": {
                "tools": [{"name": "customer_lookup", "description": "Find a customer",
                           "inputSchema": {"type": "object"}}],
                "nextCursor": "page2"
            }}),
            "tools/list" => json!({"jsonrpc": "2.0", "id": id, "result": {
                "tools": [{"name": "policy_search"}]
            }}),
            "tools/call" => match req["params"]["name"].as_str() {
                Some("customer_lookup") => json!({"jsonrpc": "2.0", "id": id, "result": {
                    "content": [{"type": "text", "text": format!("{{\"session\":{has_session}}}")}]
                }}),
                Some("flaky") => json!({"jsonrpc": "2.0", "id": id, "result": {
                    "content": [{"type": "text", "text": "upstream timeout"}],
                    "isError": true
                }}),
                Some("streamed") => {
                    let frame = json!({"jsonrpc": "2.0", "id": id, "result": {
                        "content": [{"type": "text", "text": "{\"count\":2}"}]
                    }});
                    let sse = format!("event: message\ndata: {frame}\n\n");
                    return ([("content-type", "text/event-stream")], sse).into_response();
                }
                _ => json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32602, "message": "unknown tool"}}),
            },
            _ => json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "method not found"}}),
        };
        Json(body).into_response()
    }

    async fn spawn_server() -> String {
        let router = Router::new().route("/mcp", post(mcp_handler).delete(|| async { StatusCode::OK }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/mcp")
    }

    async fn connected_gateway() -> McpHttpGateway {
        let url = spawn_server().await;
        let gateway = McpHttpGateway::new(url, Duration::from_secs(5)).unwrap();
        gateway.connect().await.unwrap();
        gateway
    }

    // ── MCP over HTTP ──────────────────────────────────────────

    #[tokio::test]
    async fn test_connect_captures_session() {
        let gateway = connected_gateway().await;
        assert_eq!(gateway.session_id().as_deref(), Some("sess-42"));
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor() {
        let gateway = connected_gateway().await;
        let tools = gateway.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["customer_lookup", "policy_search"]);
        assert_eq!(tools[0].parameters["type"], "object");
        assert_eq!(tools[1].description, "");
    }

    #[tokio::test]
    async fn test_call_tool_sends_session_header() {
        let gateway = connected_gateway().await;
        let out = gateway
            .call_tool("customer_lookup", &json!({"customer_id": "C-1"}))
            .await
            .unwrap();
        assert!(!out.is_error);
        assert_eq!(out.parsed()["session"], true);
    }

    #[tokio::test]
    async fn test_tool_reported_error_is_flagged_output() {
        let gateway = connected_gateway().await;
        let out = gateway.call_tool("flaky", &json!({})).await.unwrap();
        assert!(out.is_error);
        assert_eq!(out.text, "upstream timeout");
    }

    #[tokio::test]
    async fn test_event_stream_response() {
        let gateway = connected_gateway().await;
        let out = gateway.call_tool("streamed", &json!({})).await.unwrap();
        assert_eq!(out.parsed()["count"], 2);
    }

    #[tokio::test]
    async fn test_rpc_error_is_invocation_error() {
        let gateway = connected_gateway().await;
        let err = gateway.call_tool("nope", &json!({})).await.unwrap_err();
        match err {
            CasepilotError::ToolInvocation { tool, reason } => {
                assert_eq!(tool, "nope");
                assert!(reason.contains("unknown tool"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_gateway() {
        let gateway = McpHttpGateway::new("http://127.0.0.1:1/mcp", Duration::from_secs(1)).unwrap();
        assert!(matches!(
            gateway.connect().await,
            Err(CasepilotError::GatewayUnavailable(_))
        ));
        assert!(gateway.call_tool("customer_lookup", &json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_close_clears_session() {
        let gateway = connected_gateway().await;
        gateway.close().await.unwrap();
        assert!(gateway.session_id().is_none());
        // closing twice is a no-op
        gateway.close().await.unwrap();
    }

    // ── Mock gateway ───────────────────────────────────────────

    #[tokio::test]
    async fn test_mock_replies_in_order_then_default() {
        let gateway = MockGateway::new()
            .with_tool("account_lookup")
            .with_output("account_lookup", json!({"count": 1}))
            .with_output("account_lookup", json!({"count": 2}));
        let a = gateway.call_tool("account_lookup", &json!({})).await.unwrap();
        let b = gateway.call_tool("account_lookup", &json!({})).await.unwrap();
        let c = gateway.call_tool("account_lookup", &json!({})).await.unwrap();
        assert_eq!(a.parsed()["count"], 1);
        assert_eq!(b.parsed()["count"], 2);
        assert_eq!(c.text, "{}");
        assert_eq!(gateway.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_failures() {
        let gateway = MockGateway::new()
            .with_failure("customer_lookup", "connection reset")
            .with_tool_error("policy_search", "index offline");
        assert!(gateway.call_tool("customer_lookup", &json!({})).await.is_err());
        assert!(gateway.call_tool("policy_search", &json!({})).await.unwrap().is_error);

        let down = MockGateway::new().failing("gateway down");
        assert!(down.call_tool("anything", &json!({})).await.is_err());

        let custom = MockGateway::new().with_default_reply(MockToolReply::ToolError("x".into()));
        assert!(custom.call_tool("anything", &json!({})).await.unwrap().is_error);
    }

    #[tokio::test]
    async fn test_mock_records_arguments() {
        let gateway = MockGateway::new().with_list_failure("offline");
        gateway
            .call_tool("transactions_search", &json!({"account_id": "A-9"}))
            .await
            .unwrap();
        let calls = gateway.recorded_calls();
        let calls = calls.lock();
        assert_eq!(calls[0].tool_name, "transactions_search");
        assert_eq!(calls[0].arguments["account_id"], "A-9");
        drop(calls);
        assert!(gateway.list_tools().await.is_err());
    }
}
