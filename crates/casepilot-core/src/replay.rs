use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{SessionId, TraceId};
use crate::verdict::ResolutionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayStatus {
    Running,
    Completed,
}

impl ReplayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplayStatus::Running => "running",
            ReplayStatus::Completed => "completed",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "running" => Some(ReplayStatus::Running),
            "completed" => Some(ReplayStatus::Completed),
            _ => None,
        }
    }
}

/// Stability measurement of one original run across perturbed replays.
///
/// `running` until every replay run has been attempted, then `completed`
/// with `matches` and `stability_score` final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySession {
    pub session_id: SessionId,
    pub trace_id: TraceId,
    pub n_runs: u32,
    pub status: ReplayStatus,
    /// Runs attempted so far in this session.
    pub attempted: u32,
    pub matches: u32,
    pub stability_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReplaySession {
    pub fn start(trace_id: TraceId, n_runs: u32) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            trace_id,
            n_runs,
            status: ReplayStatus::Running,
            attempted: 0,
            matches: 0,
            stability_score: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reset to `running` with fresh counters, keeping the session identity.
    pub fn restart(&mut self, n_runs: u32) {
        self.n_runs = n_runs;
        self.status = ReplayStatus::Running;
        self.attempted = 0;
        self.matches = 0;
        self.stability_score = None;
        self.updated_at = Utc::now();
    }

    pub fn is_complete(&self) -> bool {
        self.status == ReplayStatus::Completed
    }
}

/// Outcome of one perturbed replay. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRun {
    pub session_id: SessionId,
    pub run_index: u32,
    pub perturbation_text: String,
    /// Trace of the replay investigation, absent if it never produced one.
    pub replay_trace_id: Option<TraceId>,
    /// Absent when the replay run failed.
    pub resolution_type: Option<ResolutionType>,
    pub confidence_score: f64,
    pub escalate: bool,
    pub matches_original: bool,
    #[serde(default)]
    pub error: Option<String>,
}
