use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{SessionId, TraceId};
use crate::verdict::{EscalationPriority, ResolutionType, TerminalVerdict};

/// Tool latency below this many milliseconds is reported as a cache hit.
pub const CACHE_HIT_THRESHOLD_MS: f64 = 5.0;

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Escalated,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Escalated => "escalated",
            RunStatus::Failed => "failed",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "completed" => Some(RunStatus::Completed),
            "escalated" => Some(RunStatus::Escalated),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// Whether a run was a primary investigation or a replay of one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOrigin {
    #[default]
    Primary,
    Replay { session_id: SessionId },
}

impl RunOrigin {
    pub fn is_replay(&self) -> bool {
        matches!(self, RunOrigin::Replay { .. })
    }
}

/// Audit record of one tool invocation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    /// Short fingerprint of the canonicalized arguments.
    pub argument_digest: String,
    pub latency_ms: f64,
    /// Heuristic only: latency below [`CACHE_HIT_THRESHOLD_MS`]. Network jitter
    /// produces both false positives and false negatives.
    pub cache_hit: bool,
    pub result_summary: String,
}

impl ToolCallRecord {
    pub fn looks_cached(latency_ms: f64) -> bool {
        latency_ms < CACHE_HIT_THRESHOLD_MS
    }
}

/// Everything one investigation produced. Immutable after it is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub trace_id: TraceId,
    pub issue_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub origin: RunOrigin,
    pub status: RunStatus,
    pub tool_calls: Vec<ToolCallRecord>,
    /// The verdict, or `{}` for a failed run.
    #[serde(default, with = "verdict_or_empty")]
    pub structured_output: Option<TerminalVerdict>,
    pub confidence_score: f64,
    pub escalate: bool,
    pub escalation_priority: EscalationPriority,
    pub policy_flags: Vec<String>,
    pub agent_reasoning: String,
    pub token_count: u64,
    pub duration_ms: f64,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RunResult {
    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    pub fn resolution_type(&self) -> Option<ResolutionType> {
        self.structured_output.as_ref().map(|v| v.resolution_type)
    }

    /// The `(resolution_type, escalate)` pair replay stability is measured on.
    pub fn decision(&self) -> Option<(ResolutionType, bool)> {
        self.resolution_type().map(|rt| (rt, self.escalate))
    }
}

/// Independent audit of a completed verdict. Never alters the run it reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticVerdict {
    pub agrees: bool,
    pub note: String,
    pub model_id: String,
}

impl CriticVerdict {
    pub const UNAVAILABLE_NOTE: &'static str = "Critic review unavailable.";

    /// The fixed result used whenever the review cannot be obtained.
    pub fn unavailable(model_id: impl Into<String>) -> Self {
        Self {
            agrees: true,
            note: Self::UNAVAILABLE_NOTE.into(),
            model_id: model_id.into(),
        }
    }
}

/// Fresh trace id for a new run.
pub fn new_trace_id() -> TraceId {
    Uuid::new_v4()
}

mod verdict_or_empty {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    use crate::verdict::TerminalVerdict;

    pub fn serialize<S: Serializer>(
        value: &Option<TerminalVerdict>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => v.serialize(serializer),
            None => serde_json::Map::new().serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<TerminalVerdict>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match &value {
            Value::Null => Ok(None),
            Value::Object(map) if map.is_empty() => Ok(None),
            _ => serde_json::from_value(value).map(Some).map_err(D::Error::custom),
        }
    }
}
