//! # casepilot-config
//!
//! Configuration for the Casepilot pipeline. Reads `casepilot.toml`, then
//! environment variables, then validates.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::CasepilotConfig;
pub use schema::{
    AgentConfig, ConfigWarning, CriticConfig, GatewayConfig, LoggingConfig, ReplayConfig,
    ServerConfig, ServicesConfig, StoreConfig, WarningSeverity,
};
