//! # casepilot-gateway
//!
//! Clients for the external tool-invocation gateway. The investigation loop
//! only sees the `ToolGateway` trait from `casepilot-core`; this crate
//! provides the MCP-over-HTTP implementation used in production and a
//! scripted mock for tests.

pub mod http;
pub mod mock;

pub use http::McpHttpGateway;
pub use mock::{MockGateway, MockToolReply, RecordedCall};
