use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration — maps to `casepilot.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CasepilotConfig {
    pub agent: AgentConfig,
    pub critic: CriticConfig,
    pub replay: ReplayConfig,
    pub gateway: GatewayConfig,
    pub services: ServicesConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

// ── Agent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Reasoning model driving the investigation loop.
    pub model: String,
    /// Turn ceiling for one investigation.
    pub max_turns: u32,
    /// Maximum tokens per backend response.
    pub max_tokens: u32,
    /// Temperature (0.0 - 1.0).
    pub temperature: f32,
    /// Path to a file replacing the built-in investigation prompt.
    pub system_prompt_file: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-6".into(),
            max_turns: 15,
            max_tokens: 4096,
            temperature: 0.0,
            system_prompt_file: None,
        }
    }
}

// ── Critic ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticConfig {
    pub enabled: bool,
    /// Model used for the independent review pass.
    pub model: String,
    pub max_tokens: u32,
    /// Characters of agent reasoning included in the review context.
    pub reasoning_budget_chars: usize,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "claude-haiku-4-5-20251001".into(),
            max_tokens: 300,
            reasoning_budget_chars: 600,
        }
    }
}

// ── Replay ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Model used to paraphrase the original message.
    pub model: String,
    pub max_tokens: u32,
    /// Perturbations per session when the caller does not specify.
    pub default_runs: u32,
    /// Upper bound on perturbations per session.
    pub max_runs: u32,
    /// Replay investigations allowed in flight at once, across all sessions.
    pub max_concurrent_runs: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            model: "claude-haiku-4-5-20251001".into(),
            max_tokens: 1500,
            default_runs: 3,
            max_runs: 10,
            max_concurrent_runs: 2,
        }
    }
}

// ── Gateway ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// MCP endpoint of the tool server.
    pub url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8002/mcp".into(),
            timeout_secs: 30,
        }
    }
}

// ── Services ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Falls back to `ANTHROPIC_API_KEY` when unset.
    pub anthropic_api_key: Option<String>,
    /// Override for the Anthropic API base URL.
    pub anthropic_base_url: Option<String>,
}

// ── Store ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database.
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("casepilot.db"),
        }
    }
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub listen: String,
    /// Enable permissive CORS (for local dashboards).
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".into(),
            cors: false,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "{}: {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, " ({})", h)?;
        }
        Ok(())
    }
}

impl CasepilotConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all error messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Models ───
        for (field, model) in [
            ("agent.model", &self.agent.model),
            ("critic.model", &self.critic.model),
            ("replay.model", &self.replay.model),
        ] {
            if model.trim().is_empty() {
                warnings.push(ConfigWarning {
                    field: field.into(),
                    message: "model is empty".into(),
                    severity: WarningSeverity::Error,
                    hint: Some("Set to e.g. 'claude-sonnet-4-6'".into()),
                });
            }
        }

        // ── Turn ceiling ───
        if self.agent.max_turns == 0 {
            warnings.push(ConfigWarning {
                field: "agent.max_turns".into(),
                message: "max_turns is 0, no investigation could ever run".into(),
                severity: WarningSeverity::Error,
                hint: Some("The default is 15".into()),
            });
        } else if self.agent.max_turns > 50 {
            warnings.push(ConfigWarning {
                field: "agent.max_turns".into(),
                message: format!("max_turns {} is very high", self.agent.max_turns),
                severity: WarningSeverity::Warning,
                hint: Some("Runaway investigations burn tokens until the ceiling".into()),
            });
        }

        // ── Temperature ───
        if !(0.0..=1.0).contains(&self.agent.temperature) {
            warnings.push(ConfigWarning {
                field: "agent.temperature".into(),
                message: format!("temperature {} is out of range", self.agent.temperature),
                severity: WarningSeverity::Error,
                hint: Some("Temperature must be between 0.0 and 1.0".into()),
            });
        }

        // ── Max tokens ───
        for (field, max_tokens) in [
            ("agent.max_tokens", self.agent.max_tokens),
            ("critic.max_tokens", self.critic.max_tokens),
            ("replay.max_tokens", self.replay.max_tokens),
        ] {
            if max_tokens == 0 {
                warnings.push(ConfigWarning {
                    field: field.into(),
                    message: "max_tokens is 0, the model cannot produce output".into(),
                    severity: WarningSeverity::Error,
                    hint: None,
                });
            }
        }

        // ── Replay ───
        if self.replay.max_runs == 0 {
            warnings.push(ConfigWarning {
                field: "replay.max_runs".into(),
                message: "max_runs is 0, replay is disabled".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        } else if self.replay.default_runs == 0 || self.replay.default_runs > self.replay.max_runs
        {
            warnings.push(ConfigWarning {
                field: "replay.default_runs".into(),
                message: format!(
                    "default_runs {} must be between 1 and max_runs ({})",
                    self.replay.default_runs, self.replay.max_runs
                ),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }
        if self.replay.max_concurrent_runs == 0 {
            warnings.push(ConfigWarning {
                field: "replay.max_concurrent_runs".into(),
                message: "max_concurrent_runs is 0, replay runs would never start".into(),
                severity: WarningSeverity::Error,
                hint: Some("Use 1 to serialize replay runs".into()),
            });
        }

        // ── Critic ───
        if self.critic.enabled && self.critic.reasoning_budget_chars == 0 {
            warnings.push(ConfigWarning {
                field: "critic.reasoning_budget_chars".into(),
                message: "critic will review verdicts without any agent reasoning".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Gateway ───
        if !self.gateway.url.starts_with("http://") && !self.gateway.url.starts_with("https://") {
            warnings.push(ConfigWarning {
                field: "gateway.url".into(),
                message: format!("'{}' is not an http(s) URL", self.gateway.url),
                severity: WarningSeverity::Error,
                hint: Some("e.g. http://127.0.0.1:8002/mcp".into()),
            });
        }
        if self.gateway.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "gateway.timeout_secs".into(),
                message: "no timeout, a stuck tool call blocks the run indefinitely".into(),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }

        // ── Credentials ───
        if self.services.anthropic_api_key.is_none() {
            warnings.push(ConfigWarning {
                field: "services.anthropic_api_key".into(),
                message: "no Anthropic API key configured".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set services.anthropic_api_key or ANTHROPIC_API_KEY".into()),
            });
        }

        // ── Logging ───
        if !["pretty", "json"].contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some("Valid values: pretty, json".into()),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| w.to_string())
            .collect();
        if !errors.is_empty() {
            return Err(errors.join("; "));
        }
        Ok(warnings)
    }
}
