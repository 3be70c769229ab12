use casepilot_core::{ReplayRun, ResolutionType, RunResult, SessionId};

/// Fraction of `runs` reproducing the original `(resolution_type, escalate)`
/// pair, rounded to three decimals. An empty run set scores 0.0.
pub fn compute_stability(
    original_resolution_type: ResolutionType,
    original_escalate: bool,
    runs: &[ReplayRun],
) -> f64 {
    if runs.is_empty() {
        return 0.0;
    }
    let matches = runs
        .iter()
        .filter(|r| {
            r.resolution_type == Some(original_resolution_type) && r.escalate == original_escalate
        })
        .count();
    round3(matches as f64 / runs.len() as f64)
}

/// Record a replay investigation against the original decision. A failed
/// replay has no resolution type and never matches.
pub fn replay_run_from_result(
    session_id: SessionId,
    run_index: u32,
    perturbation_text: String,
    result: &RunResult,
    original: (ResolutionType, bool),
) -> ReplayRun {
    let resolution_type = result.resolution_type();
    ReplayRun {
        session_id,
        run_index,
        perturbation_text,
        replay_trace_id: Some(result.trace_id),
        resolution_type,
        confidence_score: result.confidence_score,
        escalate: result.escalate,
        matches_original: result.decision() == Some(original),
        error: result.error.clone(),
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
