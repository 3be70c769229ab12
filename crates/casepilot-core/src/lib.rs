//! # casepilot-core
//!
//! Core types and traits for the Casepilot investigation pipeline: the
//! transcript, tool contracts, the terminal verdict and its validator, run
//! results, critic and replay records, and the persistence seam.

pub mod error;
pub mod message;
pub mod replay;
pub mod run;
pub mod store;
pub mod tool;
pub mod types;
pub mod verdict;

pub use error::{CasepilotError, Result};
pub use message::{Message, MessageContent, Role, Transcript};
pub use replay::{ReplayRun, ReplaySession, ReplayStatus};
pub use run::{CriticVerdict, RunOrigin, RunResult, RunStatus, ToolCallRecord};
pub use store::TraceStore;
pub use tool::{Tool, ToolCall, ToolGateway, ToolOutput, ToolResult};
pub use types::*;
pub use verdict::{EscalationPriority, IssueType, ResolutionType, TerminalVerdict, VerdictError};
