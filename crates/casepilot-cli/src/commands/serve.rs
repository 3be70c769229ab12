use casepilot_config::CasepilotConfig;
use casepilot_core::ToolGateway;
use casepilot_server::AppState;
use std::sync::Arc;

use super::wiring;

pub(super) async fn cmd_serve(config: CasepilotConfig) -> casepilot_core::Result<()> {
    let components = wiring::build(&config).await?;
    let state = Arc::new(AppState::new(Arc::clone(&components.pipeline), config));
    let served = casepilot_server::start_server(state).await;
    components.close().await;
    served
}

pub(super) async fn cmd_tools(config: CasepilotConfig) -> casepilot_core::Result<()> {
    let gateway = wiring::gateway(&config).await?;
    let listed = gateway.list_tools().await;
    if let Err(e) = gateway.close().await {
        tracing::warn!(error = %e, "failed to close tool gateway session");
    }
    let tools = listed?;
    println!("{} tool(s) at {}\n", tools.len(), config.gateway.url);
    for tool in tools {
        println!("  {:<32} {}", tool.name, tool.description);
    }
    Ok(())
}
