use clap::{Parser, Subcommand};
use std::path::PathBuf;

use casepilot_config::ConfigLoader;
use casepilot_core::CasepilotError;

mod investigate;
mod serve;
mod wiring;

/// Casepilot — auditable customer-issue investigations
#[derive(Parser)]
#[command(name = "casepilot", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to casepilot.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Run one investigation and print the run and its critic review as JSON
    Investigate {
        #[arg(long)]
        issue_id: String,
        #[arg(long)]
        customer_id: String,
        #[arg(long, default_value = "chat")]
        channel: String,
        #[arg(long, default_value = "normal")]
        urgency: String,
        /// The customer's message
        #[arg(long)]
        message: String,
        /// Skip the critic review
        #[arg(long)]
        no_critic: bool,
    },
    /// Replay a stored run under reworded inputs and print the session
    Replay {
        /// Trace id of the original run
        trace_id: String,
        /// Number of perturbed runs (default from config)
        #[arg(short = 'n', long)]
        runs: Option<u32>,
    },
    /// List the tools exposed by the tool gateway
    Tools,
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> casepilot_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or(&config.logging.level)
        };

        if config.logging.format == "json" {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
                )
                .json()
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
                )
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }

        match self.command {
            Commands::Serve => serve::cmd_serve(config).await,
            Commands::Investigate {
                issue_id,
                customer_id,
                channel,
                urgency,
                message,
                no_critic,
            } => {
                let request = casepilot_core::InvestigationRequest {
                    issue_id,
                    customer_id,
                    channel,
                    urgency,
                    raw_message: message,
                };
                investigate::cmd_investigate(config, request, no_critic).await
            }
            Commands::Replay { trace_id, runs } => {
                investigate::cmd_replay(config, &trace_id, runs).await
            }
            Commands::Tools => serve::cmd_tools(config).await,
            Commands::Config { json } => Self::cmd_config(config, json),
        }
    }

    fn cmd_config(config: casepilot_config::CasepilotConfig, json: bool) -> casepilot_core::Result<()> {
        // never echo the key itself
        let mut shown = config;
        if shown.services.anthropic_api_key.is_some() {
            shown.services.anthropic_api_key = Some("********".into());
        }
        if json {
            println!("{}", serde_json::to_string_pretty(&shown)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&shown).map_err(|e| CasepilotError::Config(e.to_string()))?
            );
        }
        Ok(())
    }
}

/// Print a JSON value to stdout.
fn print_json(value: &serde_json::Value) -> casepilot_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_investigate() {
        let cli = Cli::try_parse_from([
            "casepilot",
            "investigate",
            "--issue-id",
            "ISS-1",
            "--customer-id",
            "CUST-1",
            "--message",
            "Where is my wire?",
            "--no-critic",
        ])
        .unwrap();
        match cli.command {
            Commands::Investigate {
                issue_id,
                channel,
                no_critic,
                ..
            } => {
                assert_eq!(issue_id, "ISS-1");
                assert_eq!(channel, "chat");
                assert!(no_critic);
            }
            _ => panic!("expected investigate"),
        }
    }

    #[test]
    fn test_parse_replay_with_global_flags() {
        let cli = Cli::try_parse_from([
            "casepilot",
            "replay",
            "7f1c1b8e-2a43-4d0e-9c5e-1d2a3b4c5d6e",
            "-n",
            "5",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Replay { runs, .. } => assert_eq!(runs, Some(5)),
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["casepilot", "tools", "-v", "-q"]).is_err());
    }
}
