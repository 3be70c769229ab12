//! # casepilot-cli
//!
//! Command-line interface for the Casepilot investigation pipeline.
//!
//! ## Commands
//!
//! - `casepilot serve` — Start the HTTP API
//! - `casepilot investigate` — Run one investigation and print the result
//! - `casepilot replay` — Replay a stored run and print its stability
//! - `casepilot tools` — List the tools the gateway exposes
//! - `casepilot config` — Show the effective configuration

pub mod commands;

pub use commands::Cli;
