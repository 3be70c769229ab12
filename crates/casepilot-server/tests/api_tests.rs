//! HTTP API tests — every endpoint against mock backends and an in-memory store.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use casepilot_config::CasepilotConfig;
use casepilot_core::verdict::TERMINAL_TOOL_NAME;
use casepilot_gateway::MockGateway;
use casepilot_llm::mock::MockProvider;
use casepilot_runtime::Pipeline;
use casepilot_server::{AppState, build_router};
use casepilot_store::SqliteStore;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

fn submission(resolution_type: &str, escalate: bool) -> Value {
    let mut payload = json!({
        "issue_type": "ETRANSFER_FAIL",
        "root_cause": "Recipient bank rejected the transfer.",
        "resolution": "Funds returned to the account.",
        "resolution_type": resolution_type,
        "confidence_score": 0.9,
        "escalate": escalate,
        "policy_flags": []
    });
    if escalate {
        payload["escalation_priority"] = json!("MEDIUM");
    }
    payload
}

fn setup(provider: MockProvider) -> axum::Router {
    let mut config = CasepilotConfig::default();
    config.agent.model = "mock/test-model".into();
    config.critic.enabled = false;

    let pipeline = Pipeline::from_config(
        &config,
        Arc::new(provider),
        Arc::new(MockGateway::new().with_tool("customer_lookup")),
        Arc::new(SqliteStore::open_in_memory().unwrap()),
    )
    .unwrap();
    build_router(Arc::new(AppState::new(Arc::new(pipeline), config)))
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn investigation_body() -> Body {
    Body::from(
        json!({
            "issue_id": "ISS-9",
            "customer_id": "CUST-7",
            "channel": "chat",
            "urgency": "normal",
            "raw_message": "My e-transfer of $250 bounced back."
        })
        .to_string(),
    )
}

fn post_json(uri: &str, body: Body) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

async fn investigate(app: &axum::Router) -> Value {
    let resp = app
        .clone()
        .oneshot(post_json("/api/v1/investigations", investigation_body()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
}

// ── Health & Metrics ───────────────────────────────────────────

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup(MockProvider::new("mock"));
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["model"], "mock/test-model");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup(MockProvider::new("mock"));
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(ct.starts_with("text/plain"));
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("casepilot_investigations_total"));
}

// ── Investigations ─────────────────────────────────────────────

#[tokio::test]
async fn test_investigation_returns_run() {
    let app = setup(
        MockProvider::new("mock").with_tool_call(TERMINAL_TOOL_NAME, submission("REFUNDED", false)),
    );
    let run = investigate(&app).await;
    assert_eq!(run["status"], "completed");
    assert_eq!(run["structured_output"]["resolution_type"], "REFUNDED");
    assert_eq!(run["escalate"], false);
    assert!(run["trace_id"].is_string());
}

#[tokio::test]
async fn test_investigation_failure_is_still_200() {
    let app = setup(MockProvider::new("mock").with_error("HTTP 503"));
    let run = investigate(&app).await;
    assert_eq!(run["status"], "failed");
    assert_eq!(run["escalate"], true);
    assert_eq!(run["structured_output"], json!({}));
}

#[tokio::test]
async fn test_investigation_blank_message_rejected() {
    let app = setup(MockProvider::new("mock"));
    let body = Body::from(
        json!({
            "issue_id": "ISS-9",
            "customer_id": "CUST-7",
            "channel": "chat",
            "urgency": "normal",
            "raw_message": "   "
        })
        .to_string(),
    );
    let resp = app
        .oneshot(post_json("/api/v1/investigations", body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(resp).await;
    assert!(json["error"].as_str().unwrap().contains("raw_message"));
}

// ── Runs ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_run_and_list() {
    let app = setup(
        MockProvider::new("mock").with_tool_call(TERMINAL_TOOL_NAME, submission("CORRECTED", false)),
    );
    let run = investigate(&app).await;
    let trace_id = run["trace_id"].as_str().unwrap();

    let resp = app
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/runs/{trace_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["run"]["trace_id"], trace_id);
    assert!(json["critic"].is_null());

    let resp = app
        .oneshot(Request::get("/api/v1/runs?limit=5").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["runs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_run_is_404() {
    let app = setup(MockProvider::new("mock"));
    let resp = app
        .oneshot(
            Request::get(format!("/api/v1/runs/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Replay ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_replay_lifecycle() {
    let app = setup(
        MockProvider::new("mock")
            .with_tool_call(TERMINAL_TOOL_NAME, submission("AUTO_RESOLVED", false))
            .with_response(r#"["Rewording one.", "Rewording two."]"#)
            .with_tool_call(TERMINAL_TOOL_NAME, submission("AUTO_RESOLVED", false))
            .with_tool_call(TERMINAL_TOOL_NAME, submission("ESCALATED", true)),
    );
    let run = investigate(&app).await;
    let trace_id = run["trace_id"].as_str().unwrap();

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/runs/{trace_id}/replay"),
            Body::from(r#"{"n_runs": 2}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let session = body_json(resp).await;
    assert_eq!(session["status"], "running");
    assert_eq!(session["n_runs"], 2);
    let session_id = session["session_id"].as_str().unwrap().to_string();

    let mut state = Value::Null;
    for _ in 0..100 {
        let resp = app
            .clone()
            .oneshot(
                Request::get(format!("/api/v1/replay/{session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        state = body_json(resp).await;
        if state["session"]["status"] == "completed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state["session"]["status"], "completed");
    assert_eq!(state["session"]["matches"], 1);
    assert_eq!(state["session"]["stability_score"], 0.5);
    assert_eq!(state["runs"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_replay_rejections() {
    let app = setup(MockProvider::new("mock").with_error("HTTP 503"));
    let failed = investigate(&app).await;
    let trace_id = failed["trace_id"].as_str().unwrap();

    // failed run has no verdict to replay
    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/runs/{trace_id}/replay"),
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/runs/{}/replay", uuid::Uuid::new_v4()),
            Body::from(r#"{"n_runs": 2}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .oneshot(
            Request::get(format!("/api/v1/replay/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replay_run_count_bounds() {
    let app = setup(
        MockProvider::new("mock").with_tool_call(TERMINAL_TOOL_NAME, submission("REFUNDED", false)),
    );
    let run = investigate(&app).await;
    let trace_id = run["trace_id"].as_str().unwrap();

    let resp = app
        .oneshot(post_json(
            &format!("/api/v1/runs/{trace_id}/replay"),
            Body::from(r#"{"n_runs": 0}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
