use crate::replay::{ReplayRun, ReplaySession};
use crate::run::{CriticVerdict, RunResult};
use crate::types::{InvestigationRequest, SessionId, TraceId};

/// Durable storage for run traces, critic verdicts and replay records.
///
/// The pipeline holds no durable state of its own and never assumes a write
/// succeeded; callers decide whether a failure here matters.
pub trait TraceStore: Send + Sync {
    /// Persist a run together with the request that produced it.
    fn save_run(&self, run: &RunResult, request: &InvestigationRequest) -> crate::Result<()>;
    fn get_run(&self, trace_id: TraceId) -> crate::Result<Option<RunResult>>;
    fn get_request(&self, trace_id: TraceId) -> crate::Result<Option<InvestigationRequest>>;
    /// Most recent primary runs first.
    fn list_runs(&self, limit: usize) -> crate::Result<Vec<RunResult>>;

    fn save_critic(&self, trace_id: TraceId, verdict: &CriticVerdict) -> crate::Result<()>;
    fn get_critic(&self, trace_id: TraceId) -> crate::Result<Option<CriticVerdict>>;

    fn save_replay_session(&self, session: &ReplaySession) -> crate::Result<()>;
    fn get_replay_session(&self, session_id: SessionId) -> crate::Result<Option<ReplaySession>>;
    fn find_replay_session_for_trace(&self, trace_id: TraceId)
    -> crate::Result<Option<ReplaySession>>;

    fn save_replay_run(&self, run: &ReplayRun) -> crate::Result<()>;
    /// Drop previously recorded runs of a session (used on restart).
    fn clear_replay_runs(&self, session_id: SessionId) -> crate::Result<()>;
    fn list_replay_runs(&self, session_id: SessionId) -> crate::Result<Vec<ReplayRun>>;
}
