//! # casepilot-llm
//!
//! Abstraction over the reasoning backend. One production provider talks to
//! the Anthropic Messages API with tool use; the mock replays scripted turns
//! for deterministic tests.

pub mod anthropic;
pub mod mock;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use mock::{MockProvider, MockResponse};
pub use provider::{LlmProvider, LlmRequest, LlmResponse, StopReason, Usage};
