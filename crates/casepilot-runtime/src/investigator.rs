//! The orchestration loop.
//!
//! An [`Investigator`] drives one reasoning backend through a bounded
//! sequence of tool-calling turns until the model submits a verdict through
//! the terminal tool or the turn ceiling is reached. It always produces a
//! [`RunResult`]; faults become a `failed` run that escalates.

use casepilot_config::AgentConfig;
use casepilot_core::run::new_trace_id;
use casepilot_core::verdict::TERMINAL_TOOL_NAME;
use casepilot_core::{
    EscalationPriority, InvestigationRequest, Result, RunOrigin, RunResult, RunStatus,
    TerminalVerdict, Tool, ToolCall, ToolCallRecord, ToolGateway, ToolResult, TraceId,
    Transcript,
};
use casepilot_llm::{LlmProvider, LlmRequest, StopReason};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::digest::argument_digest;
use crate::prompts;
use crate::summarize::{SummarizerRegistry, error_summary};

/// What a run accumulates before it knows how it ends. Survives a fault so
/// the failed result still carries the partial tool-call log.
#[derive(Default)]
struct RunState {
    tool_calls: Vec<ToolCallRecord>,
    reasoning: Vec<String>,
    token_count: u64,
    turns: u32,
}

pub struct Investigator {
    provider: Arc<dyn LlmProvider>,
    gateway: Arc<dyn ToolGateway>,
    config: AgentConfig,
    system_prompt: String,
    summarizers: SummarizerRegistry,
}

impl Investigator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        gateway: Arc<dyn ToolGateway>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            gateway,
            config,
            system_prompt: prompts::INVESTIGATION_SYSTEM_PROMPT.to_string(),
            summarizers: SummarizerRegistry::with_defaults(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_summarizers(mut self, summarizers: SummarizerRegistry) -> Self {
        self.summarizers = summarizers;
        self
    }

    pub fn max_turns(&self) -> u32 {
        self.config.max_turns
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Run a primary investigation.
    pub async fn run(&self, request: &InvestigationRequest) -> RunResult {
        self.run_with_origin(request, RunOrigin::Primary).await
    }

    /// Run an investigation tagged with `origin`. Never fails: faults are
    /// reported as a `failed` result with `escalate=true`.
    pub async fn run_with_origin(
        &self,
        request: &InvestigationRequest,
        origin: RunOrigin,
    ) -> RunResult {
        let trace_id = new_trace_id();
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(
            %trace_id,
            issue_id = %request.issue_id,
            customer_id = %request.customer_id,
            replay = origin.is_replay(),
            "investigation started"
        );

        let mut state = RunState::default();
        let outcome = self.drive(request, trace_id, &mut state).await;
        let duration_ms = round2(clock.elapsed().as_secs_f64() * 1000.0);

        let mut result = RunResult {
            trace_id,
            issue_id: request.issue_id.clone(),
            customer_id: request.customer_id.clone(),
            origin,
            status: RunStatus::Failed,
            tool_calls: state.tool_calls,
            structured_output: None,
            confidence_score: 0.0,
            escalate: true,
            escalation_priority: EscalationPriority::High,
            policy_flags: vec![],
            agent_reasoning: state.reasoning.join("\n\n"),
            token_count: state.token_count,
            duration_ms,
            started_at,
            error: None,
        };

        match outcome {
            Ok(verdict) => {
                if verdict.has_escalation_gap() {
                    warn!(
                        %trace_id,
                        markers = ?verdict.escalation_markers(),
                        "verdict touches the hard-escalation policy but does not escalate"
                    );
                }
                result.status = if verdict.escalate {
                    RunStatus::Escalated
                } else {
                    RunStatus::Completed
                };
                result.confidence_score = verdict.confidence_score;
                result.escalate = verdict.escalate;
                result.escalation_priority = verdict.escalation_priority.unwrap_or_default();
                result.policy_flags = verdict.policy_flags.clone();
                result.structured_output = Some(verdict);
                info!(
                    %trace_id,
                    status = result.status.as_str(),
                    confidence = result.confidence_score,
                    turns = state.turns,
                    tool_calls = result.tool_calls.len(),
                    tokens = result.token_count,
                    duration_ms,
                    "investigation complete"
                );
            }
            Err(e) => {
                error!(
                    %trace_id,
                    error = %e,
                    turns = state.turns,
                    tool_calls = result.tool_calls.len(),
                    "investigation failed"
                );
                result.error = Some(e.to_string());
            }
        }
        result
    }

    async fn drive(
        &self,
        request: &InvestigationRequest,
        trace_id: TraceId,
        state: &mut RunState,
    ) -> Result<TerminalVerdict> {
        let mut transcript = Transcript::seeded(prompts::opening_turn(request));
        let tools = self.load_tools(trace_id).await?;

        let mut stopped_early = false;
        for turn in 0..self.config.max_turns {
            debug!(%trace_id, turn, "investigation turn");
            state.turns = turn + 1;

            let llm_request = LlmRequest {
                model: self.config.model.clone(),
                messages: transcript.messages().to_vec(),
                tools: tools.clone(),
                system: Some(self.system_prompt.clone()),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };
            let response = self.provider.complete(&llm_request).await?;
            state.token_count += response.usage.total_tokens();

            let text = response.message.text_content();
            let text = text.trim();
            if !text.is_empty() {
                state.reasoning.push(text.to_string());
            }

            match response.stop_reason {
                StopReason::ToolUse if response.has_tool_calls => {}
                StopReason::EndTurn => {
                    warn!(%trace_id, turn, "model ended its turn without submitting a resolution");
                    stopped_early = true;
                    break;
                }
                other => {
                    warn!(%trace_id, turn, stop_reason = ?other, "unexpected stop from reasoning backend");
                    stopped_early = true;
                    break;
                }
            }

            let calls = response.message.tool_calls.clone();
            transcript.push_assistant(response.message);

            let mut results = Vec::with_capacity(calls.len());
            let mut submitted = None;
            for call in &calls {
                if call.tool_name == TERMINAL_TOOL_NAME {
                    let verdict = TerminalVerdict::from_payload(&call.arguments)?;
                    info!(%trace_id, turn, "resolution submitted");
                    results.push(ToolResult {
                        tool_call_id: call.id.clone(),
                        content: prompts::submission_ack().to_string(),
                        is_error: false,
                    });
                    submitted = Some(verdict);
                    break;
                }
                results.push(self.invoke(trace_id, call, state).await?);
            }

            transcript.push_tool_results(results);
            if let Some(verdict) = submitted {
                return Ok(verdict);
            }
        }

        if stopped_early {
            return Ok(TerminalVerdict::early_exit_fallback());
        }
        warn!(%trace_id, max_turns = self.config.max_turns, "turn ceiling reached without a resolution");
        Ok(TerminalVerdict::max_turns_fallback())
    }

    /// Gateway tools plus the terminal tool, which the gateway never sees.
    async fn load_tools(&self, trace_id: TraceId) -> Result<Vec<Tool>> {
        let mut tools = self.gateway.list_tools().await?;
        tools.retain(|t| t.name != TERMINAL_TOOL_NAME);
        let gateway_tools = tools.len();
        tools.push(prompts::terminal_tool());
        info!(%trace_id, gateway_tools, total = tools.len(), "tools loaded");
        Ok(tools)
    }

    /// Invoke one gateway tool and record it. A failed invocation is
    /// recorded before the error propagates.
    async fn invoke(
        &self,
        trace_id: TraceId,
        call: &ToolCall,
        state: &mut RunState,
    ) -> Result<ToolResult> {
        let argument_digest = argument_digest(&call.arguments);
        let clock = Instant::now();
        let outcome = self.gateway.call_tool(&call.tool_name, &call.arguments).await;
        let elapsed_ms = clock.elapsed().as_secs_f64() * 1000.0;
        let latency_ms = round2(elapsed_ms);

        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                warn!(%trace_id, tool = %call.tool_name, digest = %argument_digest, error = %e, "tool invocation failed");
                state.tool_calls.push(ToolCallRecord {
                    tool_name: call.tool_name.clone(),
                    argument_digest,
                    latency_ms,
                    cache_hit: false,
                    result_summary: error_summary(&e.to_string()),
                });
                return Err(e);
            }
        };

        let cache_hit = ToolCallRecord::looks_cached(elapsed_ms);
        let result_summary = if output.is_error {
            error_summary(&output.text)
        } else {
            self.summarizers.summarize(&call.tool_name, &output.parsed())
        };
        debug!(
            %trace_id,
            tool = %call.tool_name,
            digest = %argument_digest,
            latency_ms,
            cache_hit,
            "tool called"
        );

        state.tool_calls.push(ToolCallRecord {
            tool_name: call.tool_name.clone(),
            argument_digest,
            latency_ms,
            cache_hit,
            result_summary,
        });

        let content = if output.text.is_empty() {
            "{}".to_string()
        } else {
            output.text
        };
        Ok(ToolResult {
            tool_call_id: call.id.clone(),
            content,
            is_error: output.is_error,
        })
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
