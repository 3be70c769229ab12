//! Construction of the live pipeline from configuration.

use casepilot_config::CasepilotConfig;
use casepilot_core::CasepilotError;
use casepilot_gateway::McpHttpGateway;
use casepilot_llm::anthropic::AnthropicProvider;
use casepilot_runtime::Pipeline;
use casepilot_store::SqliteStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Live components built for one command.
pub(crate) struct Components {
    pub pipeline: Arc<Pipeline>,
    pub gateway: Arc<McpHttpGateway>,
}

impl Components {
    /// Release the gateway session.
    pub async fn close(&self) {
        if let Err(e) = self.gateway.close().await {
            tracing::warn!(error = %e, "failed to close tool gateway session");
        }
    }
}

pub(crate) fn provider(config: &CasepilotConfig) -> casepilot_core::Result<AnthropicProvider> {
    let key = config.services.anthropic_api_key.clone().ok_or_else(|| {
        CasepilotError::Config(
            "no Anthropic API key: set services.anthropic_api_key or ANTHROPIC_API_KEY".into(),
        )
    })?;
    let mut provider = AnthropicProvider::new(key);
    if let Some(ref url) = config.services.anthropic_base_url {
        provider = provider.with_base_url(url.clone());
    }
    Ok(provider)
}

pub(crate) async fn gateway(config: &CasepilotConfig) -> casepilot_core::Result<McpHttpGateway> {
    let gateway = McpHttpGateway::new(
        config.gateway.url.clone(),
        Duration::from_secs(config.gateway.timeout_secs),
    )?;
    gateway.connect().await?;
    info!(url = %config.gateway.url, "tool gateway connected");
    Ok(gateway)
}

pub(crate) async fn build(config: &CasepilotConfig) -> casepilot_core::Result<Components> {
    let provider = Arc::new(provider(config)?);
    let gateway = Arc::new(gateway(config).await?);
    let store = Arc::new(SqliteStore::open(&config.store.db_path)?);
    let pipeline = Pipeline::from_config(config, provider, gateway.clone(), store)?;
    Ok(Components {
        pipeline: Arc::new(pipeline),
        gateway,
    })
}
