use casepilot_config::CasepilotConfig;
use casepilot_core::{CasepilotError, InvestigationRequest, TraceId};
use serde_json::json;

use super::{print_json, wiring};

pub(super) async fn cmd_investigate(
    mut config: CasepilotConfig,
    request: InvestigationRequest,
    no_critic: bool,
) -> casepilot_core::Result<()> {
    if no_critic {
        config.critic.enabled = false;
    }
    let components = wiring::build(&config).await?;
    let (run, critic) = components.pipeline.investigate_reviewed(&request).await;
    components.close().await;
    print_json(&json!({ "run": run, "critic": critic }))
}

pub(super) async fn cmd_replay(
    config: CasepilotConfig,
    trace_id: &str,
    runs: Option<u32>,
) -> casepilot_core::Result<()> {
    let trace_id: TraceId = trace_id
        .parse()
        .map_err(|e| CasepilotError::InvalidRequest(format!("bad trace id '{trace_id}': {e}")))?;

    let components = wiring::build(&config).await?;
    let outcome = async {
        let handle = components.pipeline.replay().trigger(trace_id, runs)?;
        eprintln!(
            "replaying {trace_id} ({} run(s)), session {}",
            handle.snapshot().n_runs,
            handle.session_id()
        );
        handle.wait().await;
        components.pipeline.replay().session(handle.session_id())
    }
    .await;
    components.close().await;

    match outcome? {
        Some((session, runs)) => print_json(&json!({ "session": session, "runs": runs })),
        None => Err(CasepilotError::NotFound("replay session".into())),
    }
}
