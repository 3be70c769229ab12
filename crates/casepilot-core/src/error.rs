use thiserror::Error;

use crate::verdict::VerdictError;

/// Unified error type for the Casepilot investigation pipeline.
#[derive(Error, Debug)]
pub enum CasepilotError {
    // ── Reasoning backend errors ───────────────────────────────
    #[error("reasoning backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("reasoning backend rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    // ── Tool gateway errors ────────────────────────────────────
    #[error("tool invocation failed: {tool}: {reason}")]
    ToolInvocation { tool: String, reason: String },

    #[error("tool gateway unavailable: {0}")]
    GatewayUnavailable(String),

    // ── Verdict errors ─────────────────────────────────────────
    #[error("malformed terminal payload: {0}")]
    MalformedTerminalPayload(#[from] VerdictError),

    // ── Persistence errors ─────────────────────────────────────
    #[error("store error: {0}")]
    Store(String),

    #[error("not found: {0}")]
    NotFound(String),

    // ── Request errors ─────────────────────────────────────────
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CasepilotError>;
