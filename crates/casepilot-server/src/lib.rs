//! # casepilot-server
//!
//! HTTP API over the investigation pipeline:
//!
//! - run an investigation and read back stored traces with their critic review
//! - trigger replay sessions and poll their progress
//! - health and Prometheus metrics

pub mod metrics;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use casepilot_config::CasepilotConfig;
use casepilot_core::{CasepilotError, InvestigationRequest, SessionId, TraceId};
use casepilot_runtime::Pipeline;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared server state.
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: CasepilotConfig,
    pub metrics: metrics::Metrics,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, config: CasepilotConfig) -> Self {
        Self {
            pipeline,
            config,
            metrics: metrics::Metrics::new(),
        }
    }
}

/// A pipeline error rendered as `{"error": ...}` with a matching status.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn unprocessable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }
}

impl From<CasepilotError> for ApiError {
    fn from(e: CasepilotError) -> Self {
        let status = match e {
            CasepilotError::NotFound(_) => StatusCode::NOT_FOUND,
            CasepilotError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model: String,
    uptime_secs: u64,
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Deserialize, Default)]
struct ReplayTrigger {
    n_runs: Option<u32>,
}

/// Build the Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = state.config.server.cors;
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/investigations", post(investigate_handler))
        .route("/api/v1/runs", get(list_runs_handler))
        .route("/api/v1/runs/{trace_id}", get(get_run_handler))
        .route("/api/v1/runs/{trace_id}/replay", post(replay_handler))
        .route("/api/v1/replay/{session_id}", get(replay_session_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    state.metrics.inc_http_requests();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model: state.pipeline.investigator().model().to_string(),
        uptime_secs: state.metrics.uptime_secs(),
    })
}

/// Prometheus-compatible metrics endpoint.
async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> (
    StatusCode,
    [(axum::http::header::HeaderName, &'static str); 1],
    String,
) {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.metrics.render_prometheus(),
    )
}

async fn investigate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InvestigationRequest>,
) -> ApiResult<Json<casepilot_core::RunResult>> {
    state.metrics.inc_http_requests();
    let blank = [
        ("issue_id", &request.issue_id),
        ("customer_id", &request.customer_id),
        ("raw_message", &request.raw_message),
    ]
    .into_iter()
    .find(|(_, value)| value.trim().is_empty());
    if let Some((field, _)) = blank {
        state.metrics.inc_http_errors();
        return Err(ApiError::unprocessable(format!("{field} must not be empty")));
    }

    let run = state.pipeline.investigate(&request).await;
    state.metrics.record_run(&run);
    Ok(Json(run))
}

async fn list_runs_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    state.metrics.inc_http_requests();
    let runs = state.pipeline.store().list_runs(params.limit)?;
    Ok(Json(json!({ "runs": runs })))
}

async fn get_run_handler(
    State(state): State<Arc<AppState>>,
    Path(trace_id): Path<TraceId>,
) -> ApiResult<Json<serde_json::Value>> {
    state.metrics.inc_http_requests();
    let store = state.pipeline.store();
    let Some(run) = store.get_run(trace_id)? else {
        state.metrics.inc_http_errors();
        return Err(CasepilotError::NotFound(format!("run {trace_id}")).into());
    };
    let critic = store.get_critic(trace_id)?;
    Ok(Json(json!({ "run": run, "critic": critic })))
}

async fn replay_handler(
    State(state): State<Arc<AppState>>,
    Path(trace_id): Path<TraceId>,
    body: axum::body::Bytes,
) -> ApiResult<(StatusCode, Json<casepilot_core::ReplaySession>)> {
    state.metrics.inc_http_requests();
    let trigger: ReplayTrigger = if body.iter().all(u8::is_ascii_whitespace) {
        ReplayTrigger::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::unprocessable(format!("invalid replay body: {e}")))?
    };

    match state.pipeline.replay().trigger(trace_id, trigger.n_runs) {
        Ok(handle) => {
            state.metrics.inc_replays_triggered();
            Ok((StatusCode::ACCEPTED, Json(handle.snapshot())))
        }
        Err(e) => {
            state.metrics.inc_http_errors();
            warn!(%trace_id, error = %e, "replay trigger rejected");
            Err(e.into())
        }
    }
}

async fn replay_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<serde_json::Value>> {
    state.metrics.inc_http_requests();
    match state.pipeline.replay().session(session_id)? {
        Some((session, runs)) => Ok(Json(json!({ "session": session, "runs": runs }))),
        None => {
            state.metrics.inc_http_errors();
            Err(CasepilotError::NotFound(format!("replay session {session_id}")).into())
        }
    }
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn start_server(state: Arc<AppState>) -> casepilot_core::Result<()> {
    let listen = state.config.server.listen.clone();
    let pipeline = Arc::clone(&state.pipeline);
    let router = build_router(state);

    info!(listen = %listen, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&listen).await.map_err(|e| {
        CasepilotError::Config(format!("failed to bind {listen}: {e}"))
    })?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    pipeline.replay().shutdown();
    Ok(())
}
