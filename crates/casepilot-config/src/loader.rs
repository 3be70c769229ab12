use std::path::{Path, PathBuf};
use tracing::{info, warn};

use casepilot_core::CasepilotError;

use crate::schema::CasepilotConfig;

/// Loads the Casepilot configuration.
pub struct ConfigLoader {
    config: CasepilotConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > CASEPILOT_CONFIG env > ./casepilot.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CASEPILOT_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("casepilot.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> casepilot_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            CasepilotConfig::default()
        };

        let config = Self::apply_env_overrides(config);
        Self::check(&config)?;

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Build a loader from an in-memory config (env overrides are not applied).
    pub fn from_config(config: CasepilotConfig) -> casepilot_core::Result<Self> {
        Self::check(&config)?;
        Ok(Self {
            config,
            config_path: PathBuf::from("casepilot.toml"),
        })
    }

    /// Snapshot of the loaded config.
    pub fn get(&self) -> CasepilotConfig {
        self.config.clone()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    fn parse(raw: &str, path: &Path) -> casepilot_core::Result<CasepilotConfig> {
        toml::from_str::<CasepilotConfig>(raw).map_err(|e| {
            CasepilotError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Validate — log warnings, fail on errors.
    fn check(config: &CasepilotConfig) -> casepilot_core::Result<()> {
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
                Ok(())
            }
            Err(e) => Err(CasepilotError::Config(e)),
        }
    }

    /// Apply env var overrides (CASEPILOT_AGENT_MODEL, CASEPILOT_MAX_TURNS, etc.)
    fn apply_env_overrides(mut config: CasepilotConfig) -> CasepilotConfig {
        if let Ok(v) = std::env::var("CASEPILOT_AGENT_MODEL") {
            config.agent.model = v;
        }
        if let Ok(v) = std::env::var("CASEPILOT_MAX_TURNS") {
            match v.parse::<u32>() {
                Ok(turns) => config.agent.max_turns = turns,
                Err(_) => warn!(value = %v, "ignoring non-numeric CASEPILOT_MAX_TURNS"),
            }
        }
        if let Ok(v) = std::env::var("CASEPILOT_GATEWAY_URL") {
            config.gateway.url = v;
        }
        if let Ok(v) = std::env::var("CASEPILOT_SERVER_LISTEN") {
            config.server.listen = v;
        }
        if let Ok(v) = std::env::var("CASEPILOT_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("CASEPILOT_DB_PATH") {
            config.store.db_path = PathBuf::from(v);
        }
        // Config file takes priority, env is the fallback.
        if config.services.anthropic_api_key.is_none() {
            if let Ok(v) = std::env::var("ANTHROPIC_API_KEY") {
                config.services.anthropic_api_key = Some(v);
            }
        }
        config
    }
}
