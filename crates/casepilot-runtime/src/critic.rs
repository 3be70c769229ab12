//! Independent review of a completed verdict.
//!
//! The critic is a second, cheaper backend call that audits the verdict's
//! internal consistency. It can never fail: every fault collapses into
//! [`CriticVerdict::unavailable`], and the outcome says which path was taken.

use casepilot_config::CriticConfig;
use casepilot_core::{CasepilotError, CriticVerdict, Result, RunResult, TerminalVerdict};
use casepilot_llm::{LlmProvider, LlmRequest};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::prompts;

/// Result of a review attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CriticOutcome {
    /// The backend answered with a well-formed review.
    Reviewed(CriticVerdict),
    /// No review could be obtained; carries the fixed fallback.
    Unavailable { verdict: CriticVerdict, reason: String },
}

impl CriticOutcome {
    pub fn verdict(&self) -> &CriticVerdict {
        match self {
            CriticOutcome::Reviewed(v) => v,
            CriticOutcome::Unavailable { verdict, .. } => verdict,
        }
    }

    pub fn into_verdict(self) -> CriticVerdict {
        match self {
            CriticOutcome::Reviewed(v) => v,
            CriticOutcome::Unavailable { verdict, .. } => verdict,
        }
    }

    pub fn is_reviewed(&self) -> bool {
        matches!(self, CriticOutcome::Reviewed(_))
    }
}

pub struct Critic {
    provider: Arc<dyn LlmProvider>,
    config: CriticConfig,
}

impl Critic {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CriticConfig) -> Self {
        Self { provider, config }
    }

    pub fn model_id(&self) -> &str {
        &self.config.model
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Review a verdict and its reasoning; always returns a usable verdict.
    pub async fn review_verdict(
        &self,
        issue_id: &str,
        verdict: &TerminalVerdict,
        reasoning: &str,
    ) -> CriticVerdict {
        self.review(issue_id, verdict, reasoning).await.into_verdict()
    }

    /// Review a finished run. Runs without a verdict are not reviewable.
    pub async fn review_run(&self, run: &RunResult) -> CriticOutcome {
        match run.structured_output {
            Some(ref verdict) => {
                self.review(&run.issue_id, verdict, &run.agent_reasoning)
                    .await
            }
            None => self.unavailable("run has no verdict"),
        }
    }

    pub async fn review(
        &self,
        issue_id: &str,
        verdict: &TerminalVerdict,
        reasoning: &str,
    ) -> CriticOutcome {
        if !self.config.enabled {
            return self.unavailable("critic disabled");
        }
        match self.try_review(issue_id, verdict, reasoning).await {
            Ok(v) => {
                debug!(issue_id, agrees = v.agrees, "critic review complete");
                CriticOutcome::Reviewed(v)
            }
            Err(CasepilotError::MalformedResponse(reason)) => {
                warn!(issue_id, %reason, "critic reply could not be parsed");
                self.unavailable(reason)
            }
            Err(e) => {
                warn!(issue_id, error = %e, "critic backend call failed");
                self.unavailable(e.to_string())
            }
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> CriticOutcome {
        CriticOutcome::Unavailable {
            verdict: CriticVerdict::unavailable(&self.config.model),
            reason: reason.into(),
        }
    }

    async fn try_review(
        &self,
        issue_id: &str,
        verdict: &TerminalVerdict,
        reasoning: &str,
    ) -> Result<CriticVerdict> {
        let context = prompts::critic_context(
            issue_id,
            verdict,
            reasoning,
            self.config.reasoning_budget_chars,
        );
        let mut request = LlmRequest::prompt(&self.config.model, context, self.config.max_tokens);
        request.system = Some(prompts::CRITIC_SYSTEM_PROMPT.to_string());

        let response = self.provider.complete(&request).await?;
        let (agrees, note) = parse_reply(&response.message.text_content())?;
        Ok(CriticVerdict {
            agrees,
            note,
            model_id: self.config.model.clone(),
        })
    }
}

/// Parse the two-field reply. Tolerates a markdown code fence around it.
pub fn parse_reply(raw: &str) -> Result<(bool, String)> {
    let body = strip_fence(raw.trim());
    let preview: String = body.chars().take(120).collect();
    let value: Value = serde_json::from_str(body)
        .map_err(|e| CasepilotError::MalformedResponse(format!("{e}: {preview}")))?;
    let obj = value.as_object().ok_or_else(|| {
        CasepilotError::MalformedResponse(format!("expected an object: {preview}"))
    })?;

    let agrees = match obj.get("agrees") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(CasepilotError::MalformedResponse(
                "agrees is not a boolean".into(),
            ));
        }
    };
    let note = match obj.get("note") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    };
    Ok((agrees, note))
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
